//! `stanza manifest` command

use anyhow::Result;
use serde_json::json;

use crate::GlobalOptions;
use stanza::core::manifest::PoetryManifest;
use stanza::util::context::ProjectError;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let ctx = opts.context()?;
    let path = ctx.manifest_path()?;
    let manifest = PoetryManifest::load(&path)?.ok_or_else(|| ProjectError::NotFound {
        dir: ctx.cwd().to_path_buf(),
    })?;

    let main = manifest.declared_requirements(false);
    let all = manifest.declared_requirements(true);
    let dev = &all[main.len()..];
    let section = &manifest.poetry;

    if opts.shell.is_json() {
        opts.shell.json_event(&json!({
            "reason": "manifest",
            "name": section.name,
            "version": section.version,
            "dependencies": main.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "dev-dependencies": dev.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "scripts": section.scripts.iter().map(|(k, v)| (k.clone(), v.reference().to_string())).collect::<std::collections::BTreeMap<_, _>>(),
            "extras": section.extras,
        }));
        return Ok(());
    }

    println!(
        "{} {}",
        section.name.as_deref().unwrap_or("(unnamed)"),
        section.version.as_deref().unwrap_or("")
    );
    print_list("dependencies", main.iter().map(ToString::to_string));
    print_list("dev-dependencies", dev.iter().map(ToString::to_string));
    print_list(
        "scripts",
        section
            .scripts
            .iter()
            .map(|(name, spec)| format!("{} = {}", name, spec.reference())),
    );
    print_list(
        "extras",
        section
            .extras
            .iter()
            .map(|(name, packages)| format!("{} = [{}]", name, packages.join(", "))),
    );

    Ok(())
}

fn print_list(title: &str, items: impl Iterator<Item = String>) {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for item in items {
        println!("  {}", item);
    }
}
