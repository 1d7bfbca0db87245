use serde_json::{Value, json};
use tracing::info;

use crate::config;
use crate::engine::{Geolocation, ViewportSpec, devices};
use crate::errors::{Error, Result};
use crate::protocol::EmulateParams;
use crate::session::SessionState;

const DEFAULT_ACCURACY: f64 = 100.0;

pub async fn handle_emulate(state: &mut SessionState, params: EmulateParams) -> Result<Value> {
    let page = state.page().await?;
    let driver = state.driver();

    if params.reset {
        driver.emulate_viewport(&page, None).await?;
        state.set_viewport(None);
        let (width, height) = config::DEFAULT_VIEWPORT;
        info!("Emulation reset to {}x{}", width, height);
        return Ok(json!({
            "applied": [{ "setting": "reset", "value": format!("{}x{}", width, height) }],
            "deferred": [],
        }));
    }

    let mut applied = Vec::new();
    let mut deferred = Vec::new();

    if let Some(name) = &params.device {
        let (canonical, spec) = devices::lookup(name).ok_or_else(|| {
            Error::not_found(format!(
                "Unknown device '{}'. Known devices: {}",
                name,
                devices::names().join(", ")
            ))
        })?;
        driver.emulate_viewport(&page, Some(&spec)).await?;
        applied.push(json!({ "setting": "device", "value": canonical, "viewport": spec }));
        state.set_viewport(Some(spec));
    }

    if let (Some(width), Some(height)) = (params.width, params.height) {
        let spec = ViewportSpec::desktop(width, height, params.scale.unwrap_or(1.0));
        driver.emulate_viewport(&page, Some(&spec)).await?;
        applied.push(json!({ "setting": "viewport", "value": format!("{}x{}", width, height), "scale": spec.scale }));
        state.set_viewport(Some(spec));
    }

    if let (Some(latitude), Some(longitude)) = (params.latitude, params.longitude) {
        let location = Geolocation {
            latitude,
            longitude,
            accuracy: params.accuracy.unwrap_or(DEFAULT_ACCURACY),
        };
        driver.set_geolocation(&page, location).await?;
        applied.push(json!({ "setting": "geolocation", "value": location }));
    }

    if params.locale.is_some() || params.timezone.is_some() {
        save_deferred(state, &params)?;
        for (setting, value) in [("locale", &params.locale), ("timezone", &params.timezone)] {
            if let Some(value) = value {
                deferred.push(json!({ "setting": setting, "value": value, "appliesAfter": "restart" }));
            }
        }
    }

    let mut reply = json!({ "applied": applied, "deferred": deferred });
    if !deferred.is_empty() {
        reply["note"] = json!("locale and timezone take effect after `webpilot session restart`");
    }
    Ok(reply)
}

/// Persist locale/timezone in the profile so the next server applies them.
fn save_deferred(state: &SessionState, params: &EmulateParams) -> Result<()> {
    let Some(store) = state.profiles() else {
        return Ok(());
    };
    let profile = state.profile_name();
    let mut preferences = store
        .preferences(profile)
        .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
    if let Some(locale) = &params.locale {
        preferences.locale = Some(locale.clone());
    }
    if let Some(timezone) = &params.timezone {
        preferences.timezone = Some(timezone.clone());
    }
    store
        .save_preferences(profile, &preferences)
        .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
    info!("Saved deferred emulation for profile '{}'", profile);
    Ok(())
}
