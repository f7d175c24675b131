use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "scanner": {
                "type": "object",
                "properties": {
                    "binary": { "type": "string" },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "max_attempts": { "type": "integer", "minimum": 1 },
                    "backoff_base_secs": { "type": "integer", "minimum": 0 },
                    "backoff_max_secs": { "type": "integer", "minimum": 0 },
                    "jitter": { "type": "boolean" },
                    "severities": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["CRITICAL", "HIGH", "MEDIUM", "LOW", "UNKNOWN"]
                        }
                    },
                    "ignore_unfixed": { "type": "boolean" }
                }
            },
            "exceptions": {
                "type": "object",
                "required": ["file"],
                "properties": {
                    "file": { "type": "string" }
                }
            },
            "thresholds": {
                "type": "object",
                "properties": {
                    "limits": { "$ref": "#/$defs/limits" },
                    "overrides": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["scope"],
                            "properties": {
                                "scope": { "type": "string" },
                                "limits": { "$ref": "#/$defs/limits" }
                            }
                        }
                    }
                }
            },
            "rescan": {
                "type": "object",
                "properties": {
                    "store_path": { "type": "string" },
                    "default_interval_hours": { "type": "integer", "minimum": 1 },
                    "max_parallel": { "type": "integer", "minimum": 1 },
                    "deadline_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" },
                    "format": { "type": "string", "enum": ["json", "markdown"] }
                }
            }
        },
        "$defs": {
            "limits": {
                "type": "object",
                "propertyNames": {
                    "enum": ["CRITICAL", "HIGH", "MEDIUM", "LOW", "UNKNOWN"]
                },
                "additionalProperties": { "type": "integer", "minimum": 0 }
            }
        }
    })
});
