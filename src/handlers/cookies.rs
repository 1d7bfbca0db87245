use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::config::resolve_path;
use crate::engine::{CookieRecord, NewCookie, domain_matches};
use crate::errors::{Error, Result};
use crate::protocol::{CookiesAction, CookiesParams};
use crate::session::SessionState;

const SECONDS_PER_DAY: f64 = 86_400.0;

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::usage(format!("cookies: {} is required", what)))
}

pub async fn handle_cookies(state: &mut SessionState, params: CookiesParams) -> Result<Value> {
    let driver = state.driver();
    let domain = params.domain.as_deref();
    let in_domain = |c: &CookieRecord| domain.is_none_or(|d| domain_matches(&c.domain, d));

    match params.action {
        CookiesAction::List => {
            let cookies: Vec<CookieRecord> = driver.cookies().await?.into_iter().filter(in_domain).collect();
            Ok(json!({ "count": cookies.len(), "cookies": cookies }))
        }
        CookiesAction::Get => {
            let name = required(&params.name, "--name")?;
            let cookie = driver
                .cookies()
                .await?
                .into_iter()
                .filter(in_domain)
                .find(|c| c.name == name)
                .ok_or_else(|| Error::not_found(format!("Cookie '{}' not found", name)))?;
            Ok(json!({ "cookie": cookie }))
        }
        CookiesAction::Set => {
            let name = required(&params.name, "--name")?;
            let value = required(&params.value, "--value")?;

            // Without a domain the cookie belongs to the active page's site
            let url = match domain {
                Some(_) => None,
                None => {
                    let page = state.page().await?;
                    let url = driver.page_info(&page).await?.url;
                    if !(url.starts_with("http://") || url.starts_with("https://")) {
                        return Err(Error::usage(format!(
                            "cookies set: --domain is required when the active tab is not a web page ({})",
                            url
                        )));
                    }
                    Some(url)
                }
            };
            let expires = params
                .expires_days
                .map(|days| Utc::now().timestamp() as f64 + days * SECONDS_PER_DAY);
            let record = CookieRecord {
                name: name.to_string(),
                value: value.to_string(),
                domain: domain.unwrap_or_default().to_string(),
                path: params.path.clone().unwrap_or_else(|| "/".to_string()),
                expires,
                http_only: false,
                secure: false,
                same_site: None,
            };
            driver
                .set_cookies(&[NewCookie {
                    record: record.clone(),
                    url,
                }])
                .await?;
            info!("Set cookie '{}'", name);
            Ok(json!({ "set": record }))
        }
        CookiesAction::Delete => {
            let name = required(&params.name, "--name")?;
            let removed = driver.delete_cookies(name, domain).await?;
            if removed == 0 {
                return Err(Error::not_found(format!("Cookie '{}' not found", name)));
            }
            Ok(json!({ "deleted": name, "count": removed }))
        }
        CookiesAction::Clear => {
            let count = driver.cookies().await?.len();
            driver.clear_cookies().await?;
            Ok(json!({ "cleared": count }))
        }
        CookiesAction::Export => {
            let path = resolve_path(required(&params.file, "--file")?);
            let cookies: Vec<CookieRecord> = driver.cookies().await?.into_iter().filter(in_domain).collect();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, serde_json::to_string_pretty(&cookies)?)?;
            info!("Exported {} cookies to {}", cookies.len(), path.display());
            Ok(json!({ "path": path.display().to_string(), "count": cookies.len() }))
        }
        CookiesAction::Import => {
            let path = resolve_path(required(&params.file, "--file")?);
            let json = std::fs::read_to_string(&path)
                .map_err(|e| Error::not_found(format!("Cannot read {}: {}", path.display(), e)))?;
            let records: Vec<CookieRecord> = serde_json::from_str(&json).map_err(|e| {
                Error::usage(format!("{} is not a cookie export: {}", path.display(), e))
            })?;
            if let Some(bad) = records.iter().find(|c| c.domain.is_empty()) {
                return Err(Error::usage(format!("Cookie '{}' in {} has no domain", bad.name, path.display())));
            }
            let cookies: Vec<NewCookie> = records
                .into_iter()
                .map(|record| NewCookie { record, url: None })
                .collect();
            driver.set_cookies(&cookies).await?;
            info!("Imported {} cookies from {}", cookies.len(), path.display());
            Ok(json!({ "path": path.display().to_string(), "imported": cookies.len() }))
        }
    }
}
