//! Sub-configuration structs with defaults matching the tier/camera tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root of the corpus: `<root>/originals`, `<root>/rendered`, `<root>/store.db`.
    pub root: PathBuf,

    /// Directory where model weights are stored, used by the `models` command.
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.aperture/corpus"),
            model_dir: PathBuf::from("~/.aperture/models"),
        }
    }
}

/// Persistent store settings (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Busy timeout in milliseconds before a write gives up.
    pub busy_timeout_ms: u64,

    /// Number of `SQLITE_BUSY` retries with linear back-off before `StoreError::Locked`.
    pub busy_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 60_000,
            busy_retries: 10,
        }
    }
}

/// One row of the tier table (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierSpec {
    pub long_edge: u32,
    pub jpeg_quality: u8,
    pub webp_quality: Option<u8>,
    pub progressive: bool,
    /// Chroma subsampling as `h,v` sampling factors: 444, 422, or 420.
    pub chroma_subsampling: u16,
    pub unsharp: Option<UnsharpSpec>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnsharpSpec {
    pub radius: f32,
    pub amount: f32,
    pub threshold: i32,
}

/// Tier tables for originals and variants (§4.4), overridable via config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    pub originals: HashMap<String, TierSpec>,
    pub variants: HashMap<String, TierSpec>,
}

impl Default for TiersConfig {
    fn default() -> Self {
        let originals = [
            (
                "full",
                TierSpec {
                    long_edge: 3840,
                    jpeg_quality: 92,
                    webp_quality: None,
                    progressive: true,
                    chroma_subsampling: 444,
                    unsharp: Some(UnsharpSpec {
                        radius: 0.5,
                        amount: 30.0,
                        threshold: 2,
                    }),
                },
            ),
            (
                "display",
                TierSpec {
                    long_edge: 2048,
                    jpeg_quality: 88,
                    webp_quality: Some(82),
                    progressive: true,
                    chroma_subsampling: 422,
                    unsharp: Some(UnsharpSpec {
                        radius: 0.5,
                        amount: 40.0,
                        threshold: 2,
                    }),
                },
            ),
            (
                "mobile",
                TierSpec {
                    long_edge: 1280,
                    jpeg_quality: 85,
                    webp_quality: Some(80),
                    progressive: true,
                    chroma_subsampling: 422,
                    unsharp: Some(UnsharpSpec {
                        radius: 0.4,
                        amount: 50.0,
                        threshold: 2,
                    }),
                },
            ),
            (
                "thumb",
                TierSpec {
                    long_edge: 480,
                    jpeg_quality: 82,
                    webp_quality: Some(78),
                    progressive: false,
                    chroma_subsampling: 420,
                    unsharp: Some(UnsharpSpec {
                        radius: 0.3,
                        amount: 60.0,
                        threshold: 2,
                    }),
                },
            ),
            (
                "micro",
                TierSpec {
                    long_edge: 64,
                    jpeg_quality: 70,
                    webp_quality: Some(68),
                    progressive: false,
                    chroma_subsampling: 420,
                    unsharp: None,
                },
            ),
            (
                "gemini",
                TierSpec {
                    long_edge: 2048,
                    jpeg_quality: 90,
                    webp_quality: None,
                    progressive: false,
                    chroma_subsampling: 422,
                    unsharp: Some(UnsharpSpec {
                        radius: 0.5,
                        amount: 35.0,
                        threshold: 2,
                    }),
                },
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        // Variants: 1024/768/480/64 subset, same quality params as the
        // 2048/1280/480/64 originals tiers (§4.4 "Tier table (variants)").
        let variants = [
            ("display", 1024, 88, Some(82), true, 422, (0.5, 40.0, 2)),
            ("mobile", 768, 85, Some(80), true, 422, (0.4, 50.0, 2)),
            ("thumb", 480, 82, Some(78), false, 420, (0.3, 60.0, 2)),
            ("micro", 64, 70, Some(68), false, 420, (0.0, 0.0, 0)),
        ]
        .into_iter()
        .map(|(name, long_edge, jq, wq, prog, chroma, (r, a, t))| {
            let unsharp = if name == "micro" {
                None
            } else {
                Some(UnsharpSpec {
                    radius: r,
                    amount: a,
                    threshold: t,
                })
            };
            (
                name.to_string(),
                TierSpec {
                    long_edge,
                    jpeg_quality: jq,
                    webp_quality: wq,
                    progressive: prog,
                    chroma_subsampling: chroma,
                    unsharp,
                },
            )
        })
        .collect();

        Self { originals, variants }
    }
}

/// One row of the camera profile table (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraProfile {
    pub wb_strength: f32,
    pub exp_strength: f32,
    pub shadow_thr: f32,
    pub highlight_thr: f32,
    pub sat_cap: f32,
    pub preserve_grain: bool,
    pub is_mono: bool,
}

impl Default for CameraProfile {
    fn default() -> Self {
        Self {
            wb_strength: 0.5,
            exp_strength: 0.7,
            shadow_thr: 8.0,
            highlight_thr: 3.0,
            sat_cap: 1.15,
            preserve_grain: false,
            is_mono: false,
        }
    }
}

/// Camera profile table, keyed by body label, with a `default` fallback (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraProfilesConfig {
    pub profiles: HashMap<String, CameraProfile>,
}

impl Default for CameraProfilesConfig {
    fn default() -> Self {
        let profiles = [
            (
                "Leica M8",
                CameraProfile {
                    wb_strength: 0.5,
                    exp_strength: 0.8,
                    shadow_thr: 8.0,
                    highlight_thr: 3.0,
                    sat_cap: 1.15,
                    preserve_grain: false,
                    is_mono: false,
                },
            ),
            (
                "Leica MP",
                CameraProfile {
                    wb_strength: 0.3,
                    exp_strength: 0.5,
                    shadow_thr: 10.0,
                    highlight_thr: 3.0,
                    sat_cap: 1.10,
                    preserve_grain: true,
                    is_mono: false,
                },
            ),
            (
                "Leica Monochrom",
                CameraProfile {
                    wb_strength: 0.0,
                    exp_strength: 0.7,
                    shadow_thr: 30.0,
                    highlight_thr: 3.0,
                    sat_cap: 1.00,
                    preserve_grain: false,
                    is_mono: true,
                },
            ),
            (
                "Canon G12",
                CameraProfile {
                    wb_strength: 0.7,
                    exp_strength: 0.9,
                    shadow_thr: 8.0,
                    highlight_thr: 3.0,
                    sat_cap: 1.20,
                    preserve_grain: false,
                    is_mono: false,
                },
            ),
            (
                "DJI Osmo Pro",
                CameraProfile {
                    wb_strength: 0.6,
                    exp_strength: 0.8,
                    shadow_thr: 8.0,
                    highlight_thr: 3.0,
                    sat_cap: 1.15,
                    preserve_grain: false,
                    is_mono: false,
                },
            ),
            (
                "DJI Osmo Memo",
                CameraProfile {
                    wb_strength: 0.6,
                    exp_strength: 0.7,
                    shadow_thr: 8.0,
                    highlight_thr: 2.0,
                    sat_cap: 1.15,
                    preserve_grain: false,
                    is_mono: false,
                },
            ),
            ("default", CameraProfile::default()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self { profiles }
    }
}

impl CameraProfilesConfig {
    pub fn get(&self, body: &str) -> CameraProfile {
        self.profiles
            .get(body)
            .copied()
            .unwrap_or_else(|| self.profiles.get("default").copied().unwrap_or_default())
    }
}

/// Resource limits (§4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes accepted by the scanner.
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height) accepted by the renderer.
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds.
    pub decode_timeout_ms: u64,

    /// External model/service call timeout in milliseconds (§7 Model errors).
    pub model_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            max_image_dimension: 20000,
            decode_timeout_ms: 10_000,
            model_timeout_ms: 60_000,
        }
    }
}

/// Vision-LLM provider settings (gemini / caption phases), generalizing the
/// teacher's `LlmConfig`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    pub ollama: Option<OllamaConfig>,
    pub hyperbolic: Option<HyperbolicConfig>,
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2-vision".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperbolicConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl Default for HyperbolicConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.hyperbolic.xyz/v1".to_string(),
            api_key: "${HYPERBOLIC_API_KEY}".to_string(),
            model: "meta-llama/Llama-3.2-11B-Vision-Instruct".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: "${ANTHROPIC_API_KEY}".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Accelerator selection (§6 `CORE_DEVICE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// One of `cpu`, `mps`, `cuda`. Read from `CORE_DEVICE` if unset here.
    pub device: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device: std::env::var("CORE_DEVICE").unwrap_or_else(|_| "cpu".to_string()),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Exporter settings (§4.8, §6 upload URL pattern).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Base URL used to compose `<base>/<version>/<tier>/<format>/<id>.<ext>`.
    pub base_url: String,

    /// Output directory for `export/*.json`.
    pub out_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.example.invalid".to_string(),
            out_dir: PathBuf::from("~/.aperture/corpus/export"),
        }
    }
}
