//! Kernel source overrides from the environment. Kept in its own test binary
//! since it mutates process-wide environment variables.

use cmd_metrics::collectors::ProcRoots;
use cmd_metrics::config::MetricsConfig;
use std::env;
use std::path::{Path, PathBuf};

const VARS: [&str; 3] = ["PROC_ROOT", "PROC_TCP", "PROC_TCP6"];

fn clear() {
    for v in VARS {
        env::remove_var(v);
    }
}

#[test]
fn environment_overrides_kernel_sources() {
    clear();
    let mut config = MetricsConfig::default();
    config.sources.proc_root = PathBuf::from("/cfg/proc");
    config.sources.tcp = Some(PathBuf::from("/cfg/tcp"));
    config.sources.tcp6 = Some(PathBuf::from("/cfg/tcp6"));

    // config only
    let roots = ProcRoots::from_env(&config);
    assert_eq!(roots.proc_root(), Path::new("/cfg/proc"));
    assert_eq!(roots.tcp, Path::new("/cfg/tcp"));
    assert_eq!(roots.tcp6.as_deref(), Some(Path::new("/cfg/tcp6")));

    // root alone moves the default table paths with it
    let mut bare = MetricsConfig::default();
    env::set_var("PROC_ROOT", "/fixture");
    let roots = ProcRoots::from_env(&bare);
    assert_eq!(roots.proc_root(), Path::new("/fixture"));
    assert_eq!(roots.tcp, Path::new("/fixture/net/tcp"));
    assert_eq!(roots.tcp6.as_deref(), Some(Path::new("/fixture/net/tcp6")));

    // every variable wins over the config file
    env::set_var("PROC_TCP", "/fixture/tables/tcp");
    env::set_var("PROC_TCP6", "/fixture/tables/tcp6");
    let roots = ProcRoots::from_env(&config);
    assert_eq!(roots.proc_root(), Path::new("/fixture"));
    assert_eq!(roots.tcp, Path::new("/fixture/tables/tcp"));
    assert_eq!(roots.tcp6.as_deref(), Some(Path::new("/fixture/tables/tcp6")));

    // include_tcp6 = false disables the IPv6 table even with PROC_TCP6 set
    bare.sources.include_tcp6 = false;
    let roots = ProcRoots::from_env(&bare);
    assert_eq!(roots.tcp, Path::new("/fixture/tables/tcp"));
    assert_eq!(roots.tcp6, None);

    clear();
}
