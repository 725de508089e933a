//! Request handlers for callers that exchange images as `data:` URLs.
//!
//! Each handler checks the access gate first, so an access failure is always
//! reported as [`PixelsError::AccessDenied`] and never mixed with transform
//! errors.

use serde::{Deserialize, Serialize};
use crate::access::{AccessGate, AccessToken};
use crate::error::{Result, PixelsError};
use crate::pipeline::{self, DownscaleSettings};
use crate::transport;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownscaleRequest {
    /// Source image as a base64 `data:` URL
    pub image: String,
    pub grid_size: u32,
    #[serde(default)]
    pub settings: Option<DownscaleSettings>,
    #[serde(flatten)]
    pub token: AccessToken,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub image: String,
    #[serde(flatten)]
    pub token: AccessToken,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownscaledImage {
    /// PNG `data:` URL
    pub image: String,
    pub grid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownscaleResponse {
    pub results: Vec<DownscaledImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub grid_size: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: PixelsError,
}

impl From<PixelsError> for ErrorResponse {
    fn from(error: PixelsError) -> Self {
        Self { error }
    }
}

fn check_access(gate: &dyn AccessGate, token: &AccessToken) -> Result<()> {
    if gate.allows(token) {
        Ok(())
    } else {
        tracing::warn!(user_id = %token.user_id, "Rejected request with invalid or expired key");
        Err(PixelsError::AccessDenied("Invalid or expired key".to_string()))
    }
}

pub fn handle_downscale(request: &DownscaleRequest, gate: &dyn AccessGate) -> Result<DownscaleResponse> {
    check_access(gate, &request.token)?;

    let img = transport::decode_data_url(&request.image)?;
    let settings = DownscaleSettings {
        grid_width: request.grid_size,
        ..request.settings.clone().unwrap_or_default()
    };
    let result = pipeline::downscale_with_settings(&img, &settings)?;

    Ok(DownscaleResponse {
        results: vec![DownscaledImage {
            image: transport::to_png_data_url(&result.image)?,
            grid: result.grid,
        }],
    })
}

pub fn handle_estimate(request: &EstimateRequest, gate: &dyn AccessGate) -> Result<EstimateResponse> {
    check_access(gate, &request.token)?;

    let img = transport::decode_data_url(&request.image)?;
    Ok(EstimateResponse {
        grid_size: pipeline::estimate_grid_size(&img)?,
    })
}

/// JSON in, JSON out. Failures become `{"error": "..."}`.
pub fn handle_downscale_json(body: &str, gate: &dyn AccessGate) -> String {
    respond(
        serde_json::from_str::<DownscaleRequest>(body)
            .map_err(PixelsError::from)
            .and_then(|req| handle_downscale(&req, gate)),
    )
}

pub fn handle_estimate_json(body: &str, gate: &dyn AccessGate) -> String {
    respond(
        serde_json::from_str::<EstimateRequest>(body)
            .map_err(PixelsError::from)
            .and_then(|req| handle_estimate(&req, gate)),
    )
}

fn respond<T: Serialize>(result: Result<T>) -> String {
    let encoded = match result {
        Ok(value) => serde_json::to_string(&value),
        Err(e) => serde_json::to_string(&ErrorResponse::from(e)),
    };
    encoded.unwrap_or_else(|e| fallback_error(&e.to_string()))
}

fn fallback_error(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};

    fn token() -> AccessToken {
        AccessToken {
            key: "k".to_string(),
            user_id: "u".to_string(),
            timestamp: 0,
            server_nonce: "n".to_string(),
        }
    }

    fn red_url(width: u32, height: u32) -> String {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        transport::to_png_data_url(&img).unwrap()
    }

    #[test]
    fn test_denied_before_decoding() {
        let request = DownscaleRequest {
            image: "garbage".to_string(),
            grid_size: 2,
            settings: None,
            token: token(),
        };
        let deny = |_: &AccessToken| false;
        let err = handle_downscale(&request, &deny).unwrap_err();
        assert!(err.is_access_error());
    }

    #[test]
    fn test_downscale_round_trip() {
        let request = DownscaleRequest {
            image: red_url(4, 4),
            grid_size: 2,
            settings: None,
            token: token(),
        };
        let allow = |_: &AccessToken| true;
        let response = handle_downscale(&request, &allow).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].grid, 2);

        let out = transport::decode_data_url(&response.results[0].image).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
    }

    #[test]
    fn test_estimate_flat_image() {
        let request = EstimateRequest {
            image: red_url(300, 300),
            token: token(),
        };
        let allow = |_: &AccessToken| true;
        assert_eq!(handle_estimate(&request, &allow).unwrap().grid_size, 8);
    }

    #[test]
    fn test_json_error_shape() {
        let allow = |_: &AccessToken| true;
        let body = r#"{"image":"data:image/gif;base64,AA","key":"k","userId":"u","timestamp":0,"serverNonce":"n"}"#;
        let out: serde_json::Value = serde_json::from_str(&handle_estimate_json(body, &allow)).unwrap();
        assert_eq!(out["error"], "Transport error: Unsupported image format");
    }

    #[test]
    fn test_fallback_error_escapes_message() {
        let out: serde_json::Value =
            serde_json::from_str(&fallback_error(r#"bad "key" at C:\tmp"#)).unwrap();
        assert_eq!(out["error"], r#"bad "key" at C:\tmp"#);
    }
}
