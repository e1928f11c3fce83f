//! End-to-end sync: registry resolution, HTTP artifact fetch, lockfile
//! persistence, and update detection against a live mock server.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use modsync_core::registry::RegistryVersion;
use modsync_core::{
    HttpInstaller, Installation, LockedMod, Lockfile, ModManager, Profile, ProfileStore,
    RecordingSink, Registry, RegistryResolver,
};
use tempfile::TempDir;

fn tar_gz_fixture(file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, file_name, content).unwrap();
        builder.finish().unwrap();
    }
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn release(version: &str, url: &str, hash: &str) -> RegistryVersion {
    RegistryVersion {
        version: semver::Version::parse(version).unwrap(),
        min_game_version: 0,
        dependencies: BTreeMap::new(),
        download_url: url.to_string(),
        hash: hash.to_string(),
    }
}

struct Env {
    manager: ModManager,
    sink: Arc<RecordingSink>,
    installation: Installation,
    _dirs: (TempDir, TempDir),
}

fn env(registry: Registry) -> Env {
    let game_dir = TempDir::new().unwrap();
    let profile_dir = TempDir::new().unwrap();
    let profiles = ProfileStore::new(profile_dir.path());
    profiles.save(&Profile::new("default")).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let manager = ModManager::new(
        Arc::new(RegistryResolver::new(registry)),
        Arc::new(HttpInstaller::default()),
        sink.clone(),
        profiles,
    );
    let installation = Installation::new(game_dir.path(), 1, "default");
    manager.add_installation(installation.clone());

    Env {
        manager,
        sink,
        installation,
        _dirs: (game_dir, profile_dir),
    }
}

#[tokio::test]
async fn install_resolves_fetches_and_locks_the_newest_version() {
    let body = tar_gz_fixture("rocket-boots.pak", b"pak payload");
    let hash = blake3::hash(&body).to_hex().to_string();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/artifacts/rocket-boots-1.1.0.tar.gz")
        .with_body(body)
        .create_async()
        .await;

    let mut registry = Registry::default();
    registry.mods.insert(
        "rocket-boots".to_string(),
        vec![
            release("1.0.0", &format!("{}/artifacts/rocket-boots-1.0.0.tar.gz", server.url()), ""),
            release(
                "1.1.0",
                &format!("{}/artifacts/rocket-boots-1.1.0.tar.gz", server.url()),
                &hash,
            ),
        ],
    );

    let env = env(registry);
    env.manager.install_mod("rocket-boots").await.unwrap();
    mock.assert_async().await;

    // Artifact on disk, lockfile pinned at the newest version.
    let pak = env
        .installation
        .mods_dir()
        .join("rocket-boots")
        .join("rocket-boots.pak");
    assert_eq!(std::fs::read(pak).unwrap(), b"pak payload");

    let lockfile = env.installation.load_lockfile().unwrap().unwrap();
    assert_eq!(lockfile.mods["rocket-boots"].version.to_string(), "1.1.0");

    // The progress indicator never sticks after the call returns.
    assert!(env.manager.current_progress().is_none());
    assert_eq!(env.sink.progress_events().last(), Some(&None));
}

#[tokio::test]
async fn remove_reconciles_artifacts_away() {
    let body = tar_gz_fixture("rocket-boots.pak", b"pak payload");
    let hash = blake3::hash(&body).to_hex().to_string();

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/artifacts/rocket-boots-1.1.0.tar.gz")
        .with_body(body)
        .create_async()
        .await;

    let mut registry = Registry::default();
    registry.mods.insert(
        "rocket-boots".to_string(),
        vec![release(
            "1.1.0",
            &format!("{}/artifacts/rocket-boots-1.1.0.tar.gz", server.url()),
            &hash,
        )],
    );

    let env = env(registry);
    env.manager.install_mod("rocket-boots").await.unwrap();
    assert!(env.installation.mods_dir().join("rocket-boots").exists());

    env.manager.remove_mod("rocket-boots").await.unwrap();
    assert!(!env.installation.mods_dir().join("rocket-boots").exists());

    let lockfile = env.installation.load_lockfile().unwrap().unwrap();
    assert!(lockfile.is_empty());
}

#[tokio::test]
async fn check_for_updates_reports_the_version_delta() {
    let mut registry = Registry::default();
    registry.mods.insert(
        "rocket-boots".to_string(),
        vec![
            release("1.0.0", "https://cdn.example/rocket-boots-1.0.0.tar.gz", ""),
            release("1.1.0", "https://cdn.example/rocket-boots-1.1.0.tar.gz", ""),
        ],
    );

    let env = env(registry);

    // Declared at 1.0.0 and currently locked there.
    let profiles = ProfileStore::new(env._dirs.1.path());
    let mut profile = profiles.load("default").unwrap();
    profile.add_mod("rocket-boots", "=1.0.0").unwrap();
    profiles.save(&profile).unwrap();

    let mut current = Lockfile::default();
    current.mods.insert(
        "rocket-boots".to_string(),
        LockedMod {
            version: semver::Version::new(1, 0, 0),
            dependencies: BTreeMap::new(),
            download_url: String::new(),
            hash: String::new(),
        },
    );
    env.installation.write_lockfile(&current).unwrap();

    let updates = env.manager.check_for_updates().await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].item, "rocket-boots");
    assert_eq!(updates[0].current_version.to_string(), "1.0.0");
    assert_eq!(updates[0].new_version.to_string(), "1.1.0");
}
