use tracing::trace;

use crate::platform::PackageInventory;

use super::entities::UsageRecord;

/// Returns records that had any foreground time, most used first. Ties keep the order the
/// platform reported them in.
///
/// Unless `include_system_apps` is set only launchable packages are kept. Packages the inventory
/// can't find are dropped, since there is no app to show for them.
pub async fn aggregate(
    records: Vec<UsageRecord>,
    include_system_apps: bool,
    inventory: &dyn PackageInventory,
) -> Vec<UsageRecord> {
    let mut usages = Vec::with_capacity(records.len());
    for record in records {
        if record.foreground_ms == 0 {
            continue;
        }
        if !include_system_apps && !is_launchable(&record.package, inventory).await {
            continue;
        }
        usages.push(record);
    }

    // sort_by is stable, which keeps platform order between equal durations.
    usages.sort_by(|a, b| b.foreground_ms.cmp(&a.foreground_ms));
    usages
}

async fn is_launchable(package: &str, inventory: &dyn PackageInventory) -> bool {
    match inventory.lookup_package(package).await {
        Ok(info) => info.launchable,
        Err(e) => {
            trace!("Dropping {package}: {e}");
            false
        }
    }
}
