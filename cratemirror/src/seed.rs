// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Building the resolver's initial worklist (§4.F) from the upstream
//! top-crates catalog, per-category pulls, an optional cookbook manifest,
//! and the static `additions`/`commands` lists from configuration.

use std::collections::BTreeMap;

use log::info;

use crate::catalog::CatalogClient;
use crate::config::RegistryConfig;
use crate::errors::SeedError;
use crate::exclude::ExclusionSet;
use crate::resolver::{self, RequirementSlot, Worklist};
use crate::types::PackageName;

const LOGNAME: &str = "cratemirror::seed";
const CATALOG_PER_PAGE: u32 = 100;

/// The subset of a cookbook `Cargo.toml` this builder actually reads: the
/// dependency keys, not their requirement values (§4.F adds every declared
/// dependency key with the `"latest"` sentinel, ignoring the version it was
/// pinned to upstream).
#[derive(serde::Deserialize, Debug, Default)]
struct CookbookManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

/// Build the seed worklist per §4.F: global top-N, each configured
/// category's top-N, the cookbook manifest's dependencies (if enabled),
/// then the static `additions` and `commands` lists. Exclusions are applied
/// at insertion, per §3.
pub fn build(
    client: &dyn CatalogClient,
    config: &RegistryConfig,
    exclusions: &ExclusionSet,
) -> Result<Worklist, SeedError> {
    let mut worklist = Worklist::new();

    pull_top(client, &mut worklist, exclusions, config.top_crates, None)?;

    for pull in &config.categories {
        pull_top(
            client,
            &mut worklist,
            exclusions,
            pull.count,
            Some(pull.category.as_str()),
        )?;
    }

    if config.cookbook {
        info!(target: LOGNAME, "fetching cookbook manifest");
        let text = client.fetch_text(&config.cookbook_url)?;
        let manifest: CookbookManifest = toml::from_str(&text)?;
        for name in manifest.dependencies.keys() {
            insert(&mut worklist, exclusions, name, RequirementSlot::Latest)?;
        }
    }

    for name in &config.additions {
        insert(&mut worklist, exclusions, name, RequirementSlot::Latest)?;
    }
    for name in &config.commands {
        insert(&mut worklist, exclusions, name, RequirementSlot::Latest)?;
    }

    Ok(worklist)
}

/// Pull `count` entries (paginated at `CATALOG_PER_PAGE` per request,
/// §6 "Pagination") from the top-crates endpoint, optionally scoped to
/// `category`, adding both `max_stable_version` and `max_version` for each
/// crate (§4.F: "this deliberately includes prereleases when a package's
/// newest is prerelease").
fn pull_top(
    client: &dyn CatalogClient,
    worklist: &mut Worklist,
    exclusions: &ExclusionSet,
    count: u32,
    category: Option<&str>,
) -> Result<(), SeedError> {
    let mut remaining = count;
    let mut page = 1;

    while remaining > 0 {
        let per_page = remaining.min(CATALOG_PER_PAGE);
        let result = client.top(per_page, page, category)?;
        if result.crates.is_empty() {
            break;
        }

        for krate in &result.crates {
            if let Some(stable) = &krate.max_stable_version {
                insert(
                    worklist,
                    exclusions,
                    &krate.name,
                    RequirementSlot::Req(stable.clone()),
                )?;
            }
            insert(
                worklist,
                exclusions,
                &krate.name,
                RequirementSlot::Req(krate.max_version.clone()),
            )?;
        }

        remaining -= per_page;
        page += 1;
    }

    Ok(())
}

fn insert(
    worklist: &mut Worklist,
    exclusions: &ExclusionSet,
    name: &str,
    slot: RequirementSlot,
) -> Result<(), SeedError> {
    if exclusions.excludes(name) {
        return Ok(());
    }
    let name: PackageName = name.parse()?;
    resolver::enqueue(worklist, name, slot);
    Ok(())
}
