//! Baseline files written into the workspace template and build slots

use crate::config::schema::ManagedConfig;
use serde_json::{json, Value};

/// Manifest files refreshed into every slot on materialization
pub const MANIFEST_FILES: [&str; 2] = ["package.json", "tsconfig.json"];

/// Path of the compiled artifact relative to a slot
pub const ARTIFACT_PATH: &str = "build/contract.wasm";

pub const PLACEHOLDER_CONTRACT: &str = r#"import { NearBindgen, view } from 'near-sdk-js';

@NearBindgen({})
class Template {
  @view({})
  dummy() {
    return "template";
  }
}
"#;

/// `package.json` whose build script compiles `entry`
pub fn package_json(settings: &ManagedConfig, entry: &str) -> Value {
    json!({
        "name": "near-contract-template",
        "version": "1.0.0",
        "type": "module",
        "scripts": {
            "build": format!("{} build {} {}", settings.sdk_package, entry, ARTIFACT_PATH),
        },
        "dependencies": {
            settings.sdk_package.as_str(): settings.sdk_version,
        },
    })
}

pub fn tsconfig_json() -> Value {
    json!({
        "compilerOptions": {
            "target": "ES2020",
            "module": "ESNext",
            "lib": ["ES2020"],
            "moduleResolution": "node",
            "esModuleInterop": true,
            "skipLibCheck": true,
            "resolveJsonModule": true,
            "strict": false,
            "outDir": "./build",
            "rootDir": "./src",
            "allowSyntheticDefaultImports": true,
        },
        "include": ["src/**/*"],
        "exclude": ["node_modules", "build"],
    })
}
