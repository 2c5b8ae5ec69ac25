// racer_sim/src/simulation/config/resolver.rs

//! Expands `from = "..."` prefab references in agent definitions.
//!
//! A dictionary with a `from` key starts from the named catalog entry and
//! deep-merges its sibling keys on top. A nested dictionary that carries its
//! own `from` replaces the base value instead of merging into it.

use super::catalog::PrefabCatalog;
use super::ConfigError;
use figment::value::{Dict, Tag, Value};

/// Nested `from` chains deeper than this are treated as a cycle.
const MAX_DEPTH: usize = 16;

pub fn resolve_agent_value(agent_value: &Value, catalog: &PrefabCatalog) -> Result<Value, ConfigError> {
    resolve_value_recursively(agent_value, catalog, &mut Vec::new())
}

/// Merges the contents of `override_dict` into `base`.
fn deep_merge(base: &mut Dict, override_dict: &Dict) {
    for (key, override_val) in override_dict {
        // A value with its own 'from' is a complete replacement, not a merge.
        if let Some(d) = override_val.as_dict() {
            if d.contains_key("from") {
                base.insert(key.clone(), override_val.clone());
                continue;
            }
        }

        if let Some(base_val) = base.get_mut(key) {
            if let (Some(base_sub_dict), Some(override_sub_dict)) =
                (base_val.as_dict(), override_val.as_dict())
            {
                let mut new_sub_dict = base_sub_dict.clone();
                deep_merge(&mut new_sub_dict, override_sub_dict);
                *base_val = Value::Dict(Tag::Default, new_sub_dict);
                continue;
            }
        }
        base.insert(key.clone(), override_val.clone());
    }
}

fn resolve_value_recursively(
    value: &Value,
    catalog: &PrefabCatalog,
    chain: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    // --- STEP 1: Resolve the current node if it's a 'from' reference. ---
    let current_node = match value.as_dict() {
        Some(dict) => match dict.get("from").and_then(|v| v.as_str()) {
            Some(from_key) => {
                if chain.iter().any(|k| k == from_key) || chain.len() >= MAX_DEPTH {
                    return Err(ConfigError::CyclicPrefab(from_key.to_string()));
                }
                let base_prefab_data = catalog
                    .get(from_key)
                    .ok_or_else(|| ConfigError::PrefabNotFound(from_key.to_string()))?;

                // Resolve the base prefab first to get its complete structure.
                chain.push(from_key.to_string());
                let resolved_base = resolve_value_recursively(base_prefab_data, catalog, chain)?;
                chain.pop();

                let mut final_dict = resolved_base
                    .into_dict()
                    .ok_or_else(|| ConfigError::NotADictionary(from_key.to_string()))?;

                // The sibling keys of `from` are this level's overrides.
                deep_merge(&mut final_dict, dict);

                Value::Dict(Tag::Default, final_dict)
            }
            None => value.clone(),
        },
        None => value.clone(),
    };

    // --- STEP 2: Now that the current node is resolved, resolve its children. ---
    match &current_node {
        Value::Dict(tag, dict) => {
            let mut new_dict = Dict::new();
            for (key, val) in dict.iter() {
                // The 'from' key has been processed, so we strip it from the final output.
                if key == "from" {
                    continue;
                }
                new_dict.insert(key.clone(), resolve_value_recursively(val, catalog, chain)?);
            }
            Ok(Value::Dict(*tag, new_dict))
        }
        Value::Array(tag, arr) => {
            let resolved_arr = arr
                .iter()
                .map(|item| resolve_value_recursively(item, catalog, chain))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(*tag, resolved_arr))
        }
        _ => Ok(current_node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};
    use figment::Figment;

    fn value(toml: &str) -> Value {
        Figment::from(Toml::string(toml)).extract().unwrap()
    }

    fn catalog() -> PrefabCatalog {
        let mut catalog = PrefabCatalog::default();
        catalog.0.insert(
            "vehicles.kart".into(),
            value(
                r#"
                mass = 150.0
                max_steer_angle = 0.5
                [drift]
                rear = 0.6
                front = 1.4
                "#,
            ),
        );
        catalog.0.insert(
            "vehicles.heavy_kart".into(),
            value(
                r#"
                from = "vehicles.kart"
                mass = 220.0
                "#,
            ),
        );
        catalog.0.insert("vehicles.loop_a".into(), value(r#"from = "vehicles.loop_b""#));
        catalog.0.insert("vehicles.loop_b".into(), value(r#"from = "vehicles.loop_a""#));
        catalog
    }

    fn float(value: &Value, path: &str) -> f64 {
        value.find_ref(path).and_then(|v| v.to_f64()).unwrap()
    }

    #[test]
    fn overrides_deep_merge_into_the_prefab() {
        let agent = value(
            r#"
            name = "ai"
            [vehicle]
            from = "vehicles.heavy_kart"
            drift = { rear = 0.4 }
            "#,
        );
        let resolved = resolve_agent_value(&agent, &catalog()).unwrap();
        assert_eq!(float(&resolved, "vehicle.mass"), 220.0);
        assert_eq!(float(&resolved, "vehicle.max_steer_angle"), 0.5);
        assert_eq!(float(&resolved, "vehicle.drift.rear"), 0.4);
        assert_eq!(float(&resolved, "vehicle.drift.front"), 1.4);
        assert!(resolved.find_ref("vehicle.from").is_none());
    }

    #[test]
    fn unknown_prefab_is_an_error() {
        let agent = value(r#"vehicle = { from = "vehicles.hovercraft" }"#);
        assert!(matches!(
            resolve_agent_value(&agent, &catalog()),
            Err(ConfigError::PrefabNotFound(key)) if key == "vehicles.hovercraft"
        ));
    }

    #[test]
    fn cycles_are_reported() {
        let agent = value(r#"vehicle = { from = "vehicles.loop_a" }"#);
        assert!(matches!(
            resolve_agent_value(&agent, &catalog()),
            Err(ConfigError::CyclicPrefab(_))
        ));
    }

    #[test]
    fn scalar_prefab_cannot_be_merged() {
        let mut catalog = catalog();
        catalog.0.insert("strings.seven".into(), Value::from("seven"));
        let agent = value(r#"vehicle = { from = "strings.seven" }"#);
        assert!(matches!(
            resolve_agent_value(&agent, &catalog),
            Err(ConfigError::NotADictionary(_))
        ));
    }
}
