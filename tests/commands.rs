mod common;

use clap::Parser;
use common::utf8_tempdir;
use spplice_lib::commands::install::descriptor_from_arg;
use spplice_lib::commands::maintenance::merge;
use spplice_lib::commands::{Cli, Command};
use spplice_lib::config::AppPaths;
use std::fs;

#[test]
fn test_cli_parses_install_and_game_override() {
    let cli = Cli::parse_from(["spplice", "--game", "2", "install", "a.tar.xz", "b.json"]);
    assert_eq!(cli.game, Some(2));
    match cli.command {
        Command::Install { packages } => {
            let names: Vec<&str> = packages.iter().map(|p| p.as_str()).collect();
            assert_eq!(names, vec!["a.tar.xz", "b.json"]);
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(Cli::try_parse_from(["spplice", "install"]).is_err());
}

#[test]
fn test_arguments_become_descriptors() {
    let (_tmp, root) = utf8_tempdir();

    let manifest = root.join("pkg.json");
    fs::write(&manifest, r#"{"title":"Demo","author":"me","file":"https://x/demo.tar.xz","args":["+map","x"]}"#).unwrap();
    let remote = descriptor_from_arg(&manifest).unwrap();
    assert_eq!(remote.title, "Demo");
    assert_eq!(remote.launch_args, vec!["+map", "x"]);
    assert!(!remote.is_local());

    let archive = root.join("local.tar.xz");
    fs::write(&archive, "x").unwrap();
    let local = descriptor_from_arg(&archive).unwrap();
    assert!(local.is_local());
    assert_eq!(local.title, "local");

    assert!(descriptor_from_arg(&root.join("missing.tar.xz")).is_err());
}

#[test]
fn test_merge_command_leaves_sources_intact() {
    let (_tmp, root) = utf8_tempdir();
    let paths = AppPaths {
        app_dir: root.join("app"),
        cache_dir: root.join("cache"),
    };

    let a = root.join("a");
    let b = root.join("b");
    fs::create_dir_all(a.join("cfg")).unwrap();
    fs::create_dir_all(b.join("cfg")).unwrap();
    fs::write(a.join("cfg/autoexec.cfg"), "sv_cheats 1").unwrap();
    fs::write(b.join("cfg/autoexec.cfg"), "sv_cheats 0\nfps_max 300").unwrap();

    let out = root.join("out");
    merge(&paths, &[a.clone(), b.clone()], &out).unwrap();

    assert_eq!(fs::read_to_string(out.join("cfg/autoexec.cfg")).unwrap(), "sv_cheats 1\nfps_max 300");
    assert!(a.join("cfg/autoexec.cfg").exists());
    assert!(b.join("cfg/autoexec.cfg").exists());
    assert!(!root.join("cache/merge").exists());
}
