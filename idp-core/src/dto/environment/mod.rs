//! Environment definition DTOs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition written to a configuration environment
///
/// Serialized as JSON, which the environment API accepts as YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default)]
    pub values: EnvironmentValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentValues {
    #[serde(rename = "pulumiConfig", default)]
    pub pulumi_config: Map<String, Value>,
}

impl EnvironmentDefinition {
    /// Imports the stage environment and merges the overrides in order.
    pub fn for_stage(stage: &str, overrides: &[Map<String, Value>]) -> Self {
        let mut pulumi_config = Map::new();
        for layer in overrides {
            for (key, value) in layer {
                pulumi_config.insert(key.clone(), value.clone());
            }
        }

        let imports = if stage.is_empty() {
            Vec::new()
        } else {
            vec![stage.to_string()]
        };

        Self {
            imports,
            values: EnvironmentValues { pulumi_config },
        }
    }
}

/// Response of the environment open call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenEnvironment {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_merge_later_wins() {
        let layers: Vec<Map<String, Value>> = vec![
            serde_json::from_value(json!({"region": "us-east-1", "size": 1})).unwrap(),
            serde_json::from_value(json!({"size": 3})).unwrap(),
        ];
        let def = EnvironmentDefinition::for_stage("dev", &layers);

        assert_eq!(def.imports, vec!["dev"]);
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({"imports": ["dev"], "values": {"pulumiConfig": {"region": "us-east-1", "size": 3}}})
        );
    }
}
