mod app;
mod ui;

use std::io::BufRead;

use notifeed::config::{parse_base_url, FileConfig, SessionKeyBackend, SourceConfig};
use notifeed::core::keyring;
use notifeed::core::models::DEFAULT_PAGE_SIZE;

/// `notifeed login <site-url> <username> <user-id>`: read the session key
/// from stdin, store it in the keyring and write the config file.
fn login(args: &[String]) -> Result<(), String> {
    let [site, username, user_id] = args else {
        return Err("usage: notifeed login <site-url> <username> <user-id>".into());
    };
    let base_url = parse_base_url(site)?;
    let recipient_id: i64 = user_id
        .parse()
        .map_err(|e| format!("invalid user id {user_id:?}: {e}"))?;

    eprintln!("Session key for {username}:");
    let mut session_key = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut session_key)
        .map_err(|e| format!("read session key: {e}"))?;
    let session_key = session_key.trim();
    if session_key.is_empty() {
        return Err("empty session key".into());
    }

    let host = base_url.host_str().unwrap_or_default();
    keyring::set_session_key(username, host, session_key)?;

    FileConfig {
        source: SourceConfig::Remote {
            base_url: base_url.to_string(),
            username: username.clone(),
            session: SessionKeyBackend::Keyring,
        },
        recipient_id,
        page_size: DEFAULT_PAGE_SIZE,
        scroll_threshold: 0.0,
        embed_user_from: true,
        embed_user_to: false,
        desktop_alerts: true,
        count_refresh_secs: 5 * 60,
    }
    .save()?;

    log::info!("Saved config for {} at {}", username, base_url);
    Ok(())
}

/// `notifeed logout`: forget the session key of the configured site.
fn logout() -> Result<(), String> {
    let Some(config) = FileConfig::load()? else {
        return Err("not logged in".into());
    };
    match config.source {
        SourceConfig::Remote {
            base_url,
            username,
            session: SessionKeyBackend::Keyring,
        } => {
            let base_url = parse_base_url(&base_url)?;
            let host = base_url.host_str().unwrap_or_default();
            keyring::delete_session_key(&username, host)?;
            log::info!("Removed session key for {} at {}", username, base_url);
            Ok(())
        }
        SourceConfig::Remote { .. } => {
            Err("session key is stored in the config file; edit it to log out".into())
        }
        SourceConfig::Local { .. } => Err("no remote site configured".into()),
    }
}

fn main() -> cosmic::iced::Result {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first().map(String::as_str) {
        Some("login") => Some(login(&args[1..])),
        Some("logout") => Some(logout()),
        _ => None,
    };
    if let Some(result) = command {
        if let Err(e) = result {
            eprintln!("{e}");
            std::process::exit(1);
        }
        return Ok(());
    }

    let settings = cosmic::app::Settings::default().size_limits(
        cosmic::iced::Limits::NONE
            .min_width(360.0)
            .min_height(120.0),
    );

    cosmic::app::run::<app::AppModel>(settings, ())
}
