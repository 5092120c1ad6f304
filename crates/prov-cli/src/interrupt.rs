//! Ctrl-C handling while a captured program runs.

use std::sync::OnceLock;

use prov_capture::CancelToken;

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
}

/// Routes SIGINT to the returned token instead of killing prov, so the
/// interrupted run is still sealed and stored.
pub fn install() -> CancelToken {
    let token = CANCEL.get_or_init(CancelToken::new).clone();
    #[cfg(unix)]
    {
        let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        let previous = unsafe { libc::signal(libc::SIGINT, handler) };
        if previous == libc::SIG_ERR {
            tracing::warn!("could not install the interrupt handler");
        }
    }
    token
}
