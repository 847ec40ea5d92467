//! Ready-made package graphs and on-disk modules.
//!
//! The in-memory graph and the on-disk module describe the same application:
//!
//! ```text
//! example.com/app          InitServer (tag server), InitMetrics (tag metrics)
//! ├── example.com/app/db       DBSet: DefaultConfig, NewDB
//! └── example.com/app/metrics  MetricsSet: NewRegistry
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::constants::MODULE_FILE;
use crate::model::{DeclKind, InjectorDecl, PackageDescriptor, ProviderDecl, SetDecl};

/// Module path of the sample application.
pub const APP_MODULE: &str = "example.com/app";

/// Declarations of the root package.
pub const APP_DECLS: &str = r#"
[[provider]]
name = "NewServer"
inputs = ["*DB"]
output = "*Server"

[[set]]
name = "AppSet"
providers = ["NewServer"]
sets = ["example.com/app/db.DBSet"]

[[injector]]
name = "InitServer"
outputs = ["*Server"]
sets = ["AppSet"]
returns_error = true
tags = ["server"]

[[injector]]
name = "InitMetrics"
outputs = ["*Registry"]
sets = ["example.com/app/metrics.MetricsSet"]
tags = ["metrics"]
"#;

/// Declarations of the `db` package.
pub const DB_DECLS: &str = r#"
[types.Config]
kind = "struct"
fields = [{ name = "Url", type = "string" }]

[[provider]]
name = "DefaultConfig"
kind = "value"
output = "Config"
expr = "Config::default()"

[[provider]]
name = "NewDB"
inputs = ["Config"]
output = "*DB"
returns_error = true

[[set]]
name = "DBSet"
providers = ["DefaultConfig", "NewDB"]
"#;

/// Declarations of the `metrics` package.
pub const METRICS_DECLS: &str = r#"
[[provider]]
name = "NewRegistry"
output = "*Registry"

[[set]]
name = "MetricsSet"
providers = ["NewRegistry"]
"#;

fn function(name: &str, inputs: &[&str], output: &str) -> ProviderDecl {
    ProviderDecl {
        name: name.to_string(),
        inputs: inputs.iter().map(|&t| t.into()).collect(),
        output: Some(output.into()),
        ..ProviderDecl::default()
    }
}

fn set(name: &str, providers: &[&str], sets: &[&str]) -> SetDecl {
    SetDecl {
        name: name.to_string(),
        providers: providers.iter().map(|s| s.to_string()).collect(),
        sets: sets.iter().map(|s| s.to_string()).collect(),
    }
}

fn injector(name: &str, output: &str, sets: &[&str], tag: &str) -> InjectorDecl {
    InjectorDecl {
        name: name.to_string(),
        outputs: vec![output.into()],
        sets: sets.iter().map(|s| s.to_string()).collect(),
        tags: vec![tag.to_string()],
        ..InjectorDecl::default()
    }
}

/// The sample application as descriptors, with imports filled in.
pub fn app_packages() -> Vec<PackageDescriptor> {
    let mut app = PackageDescriptor::new(APP_MODULE);
    app.dir = PathBuf::from("/work/app");
    app.imports = vec!["example.com/app/db".to_string(), "example.com/app/metrics".to_string()];
    app.providers.push(function("NewServer", &["*DB"], "*Server"));
    app.sets.push(set("AppSet", &["NewServer"], &["example.com/app/db.DBSet"]));
    app.injectors.push(InjectorDecl {
        returns_error: true,
        ..injector("InitServer", "*Server", &["AppSet"], "server")
    });
    app.injectors.push(injector(
        "InitMetrics",
        "*Registry",
        &["example.com/app/metrics.MetricsSet"],
        "metrics",
    ));

    let mut db = PackageDescriptor::new("example.com/app/db");
    db.dir = PathBuf::from("/work/app/db");
    db.providers.push(ProviderDecl {
        name: "DefaultConfig".to_string(),
        kind: DeclKind::Value,
        output: Some("Config".into()),
        expr: Some("Config::default()".to_string()),
        ..ProviderDecl::default()
    });
    db.providers.push(ProviderDecl {
        returns_error: true,
        ..function("NewDB", &["Config"], "*DB")
    });
    db.sets.push(set("DBSet", &["DefaultConfig", "NewDB"], &[]));

    let mut metrics = PackageDescriptor::new("example.com/app/metrics");
    metrics.dir = PathBuf::from("/work/app/metrics");
    metrics.providers.push(function("NewRegistry", &[], "*Registry"));
    metrics.sets.push(set("MetricsSet", &["NewRegistry"], &[]));

    vec![app, db, metrics]
}

/// A root package whose only injector needs a package nobody provides.
pub fn broken_package() -> PackageDescriptor {
    let mut pkg = PackageDescriptor::new("example.com/broken");
    pkg.dir = PathBuf::from("/work/broken");
    pkg.imports = vec!["example.com/missing".to_string()];
    pkg.injectors.push(injector("InitBroken", "*Thing", &["example.com/missing.ThingSet"], "server"));
    pkg
}

/// A temporary module directory with a `wire.mod` at its root.
pub struct ModuleFixture {
    dir: TempDir,
}

impl ModuleFixture {
    /// Create an empty module.
    pub fn new(module: &str) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        fs::write(dir.path().join(MODULE_FILE), format!("module = \"{module}\"\n"))
            .context("Failed to write module file")?;
        Ok(Self {
            dir,
        })
    }

    /// The sample application on disk.
    pub fn app() -> Result<Self> {
        let fixture = Self::new(APP_MODULE)?;
        fixture.write("wire.toml", APP_DECLS)?;
        fixture.write("db/wire.toml", DB_DECLS)?;
        fixture.write("metrics/wire.toml", METRICS_DECLS)?;
        Ok(fixture)
    }

    /// Module root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
