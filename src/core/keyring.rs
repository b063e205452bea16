//! LMS session keys in the OS secret store, one entry per `user@host`.

const SERVICE: &str = "notifeed";

fn account(username: &str, host: &str) -> String {
    format!("{username}@{host}")
}

fn entry(username: &str, host: &str) -> Result<keyring::Entry, String> {
    let account = account(username, host);
    keyring::Entry::new(SERVICE, &account).map_err(|e| {
        log::error!("No secret store entry for {account}: {e}");
        format!("secret store unavailable for {account}: {e}")
    })
}

/// Session key used against the AJAX endpoint of `host`.
pub fn get_session_key(username: &str, host: &str) -> Result<String, String> {
    log::debug!("Loading session key for {}", account(username, host));
    entry(username, host)?.get_password().map_err(|e| match e {
        keyring::Error::NoEntry => format!(
            "no session key stored for {}; run `notifeed login`",
            account(username, host)
        ),
        e => format!("could not read session key: {e}"),
    })
}

pub fn set_session_key(username: &str, host: &str, session_key: &str) -> Result<(), String> {
    log::debug!("Storing session key for {}", account(username, host));
    entry(username, host)?
        .set_password(session_key)
        .map_err(|e| format!("could not store session key: {e}"))
}

/// Forget the stored key. Succeeds when there was none.
pub fn delete_session_key(username: &str, host: &str) -> Result<(), String> {
    match entry(username, host)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(format!("could not delete session key: {e}")),
    }
}
