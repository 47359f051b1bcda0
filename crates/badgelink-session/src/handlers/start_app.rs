//! Start-application handler (spec §4.5): the only handler with a side
//! effect that outlives the response itself (a delayed reboot).

use badgelink_wire::StatusCode;

use crate::collaborators::AppStore;

/// Outcome of a `StartApp` request. `reboot_requested` tells the caller to
/// schedule [`Reboot::request_reboot`](crate::collaborators::Reboot) after
/// the ~200ms drain delay, per spec §4.5/§5.
pub struct StartAppOutcome {
    pub status: StatusCode,
    pub reboot_requested: bool,
}

/// Opens `slug` in the app store and selects it for next boot, per
/// `original_source/components/badgelink/badgelink_startapp.c:17-28`:
/// `appfsOpen` missing the slug is `NotFound`, a failed `appfsBootSelect`
/// is `InternalError`, only then does it respond `Ok` and request a reboot.
#[must_use]
pub fn handle<AS: AppStore>(store: &mut AS, slug: &str, arg: u32) -> StartAppOutcome {
    let Some(handle) = store.open(slug) else {
        return StartAppOutcome {
            status: StatusCode::NotFound,
            reboot_requested: false,
        };
    };
    if !store.boot_select(handle, arg) {
        return StartAppOutcome {
            status: StatusCode::InternalError,
            reboot_requested: false,
        };
    }
    StartAppOutcome {
        status: StatusCode::Ok,
        reboot_requested: true,
    }
}
