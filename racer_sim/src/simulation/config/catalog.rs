// racer_sim/src/simulation/config/catalog.rs

//! This module defines the `PrefabCatalog` resource and the startup system
//! that loads every prefab definition from disk.

use bevy::prelude::*;
use figment::{
    providers::{Format, Toml},
    value::Value,
    Figment,
};
use std::{collections::HashMap, path::Path};
use walkdir::WalkDir;

/// Where prefab definitions live, relative to the working directory.
pub const CATALOG_DIR: &str = "assets/catalog";

/// A Bevy resource that holds the entire parsed catalog of prefabs.
/// The key is a namespace string (e.g., "vehicles.kart") and the value is
/// the raw, parsed TOML data for that prefab.
#[derive(Resource, Default, Debug)]
pub struct PrefabCatalog(pub HashMap<String, Value>);

impl PrefabCatalog {
    /// Walks `root` and parses every `.toml` file below it. Files that fail to
    /// parse are logged and skipped.
    pub fn load_from_dir(root: &Path) -> Self {
        let mut catalog = Self::default();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                !e.file_type().is_dir() && e.path().extension().is_some_and(|ext| ext == "toml")
            })
        {
            let path = entry.path();
            let Some(key) = catalog_key(root, path) else {
                continue;
            };

            match Figment::new().merge(Toml::file(path)).extract::<Value>() {
                Ok(data) => {
                    debug!("Loaded catalog item: '{}'", key);
                    catalog.0.insert(key, data);
                }
                Err(e) => {
                    error!("Failed to load catalog item from {:?}: {}", path, e);
                }
            }
        }
        catalog
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Turns `root/vehicles/kart.toml` into `vehicles.kart`.
fn catalog_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!segments.is_empty()).then(|| segments.join("."))
}

/// A startup system that populates the `PrefabCatalog` resource from disk.
pub fn load_catalog_from_disk(mut catalog: ResMut<PrefabCatalog>) {
    let catalog_path = Path::new(CATALOG_DIR);
    if !catalog_path.exists() {
        warn!(
            "Catalog directory not found at {:?}, no prefabs will be loaded.",
            catalog_path
        );
        return;
    }

    info!("Loading prefab catalog from: {:?}", catalog_path);
    *catalog = PrefabCatalog::load_from_dir(catalog_path);
    info!("Loaded {} catalog item(s).", catalog.0.len());
}
