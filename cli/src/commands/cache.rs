use anyhow::Context;
use lookout_common::config::Config;
use lookout_core::cache::CacheStore;

use crate::terminal::print;

pub fn clear(cfg: &Config) -> anyhow::Result<()> {
    let dir = &cfg.settings.cache_dir;
    let cache = CacheStore::open(dir).with_context(|| format!("opening cache at {}", dir.display()))?;
    let removed = cache.clear_all().context("clearing cache")?;
    print::print_status(format!(
        "removed {removed} entr{} from {}",
        if removed == 1 { "y" } else { "ies" },
        cache.dir().display()
    ));
    Ok(())
}
