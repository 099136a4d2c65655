use serde::{Deserialize, Serialize};

use super::error::EncoderError;

/// Standard deviation used by `"learnable_normal"` when none is given.
pub const DEFAULT_NORMAL_POS_STD: f64 = 0.02;

/// Positional encoding variant, resolved once from its configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionalEncodingKind {
    /// No positional information is added.
    None,
    /// Learned table initialised uniformly in [0, 1).
    LearnableUniform,
    /// Learned table initialised from N(0, std^2).
    LearnableNormal { std: f64 },
}

impl Default for PositionalEncodingKind {
    fn default() -> Self {
        Self::LearnableUniform
    }
}

impl PositionalEncodingKind {
    /// Parse a configuration name.
    ///
    /// Recognised names are `learnable_uniform`, `learnable_normal` and
    /// `learnable_normal-<std>`. Any other name disables positional encoding.
    /// A `learnable_normal-` name with an unusable std is rejected.
    pub fn from_name(name: &str) -> Result<Self, EncoderError> {
        match name {
            "learnable_uniform" => Ok(Self::LearnableUniform),
            "learnable_normal" => Ok(Self::LearnableNormal {
                std: DEFAULT_NORMAL_POS_STD,
            }),
            _ => match name.strip_prefix("learnable_normal-") {
                Some(raw_std) => {
                    let invalid = |reason: String| EncoderError::InvalidPositionalEncoding {
                        name: name.to_string(),
                        reason,
                    };
                    let std: f64 = raw_std
                        .parse()
                        .map_err(|e| invalid(format!("cannot parse std '{}': {}", raw_std, e)))?;
                    if !std.is_finite() || std < 0.0 {
                        return Err(invalid(format!("std must be finite and >= 0, got {}", std)));
                    }
                    Ok(Self::LearnableNormal { std })
                }
                None => Ok(Self::None),
            },
        }
    }

    /// Canonical configuration name of this variant.
    pub fn name(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::LearnableUniform => "learnable_uniform".to_string(),
            Self::LearnableNormal { std } if *std == DEFAULT_NORMAL_POS_STD => {
                "learnable_normal".to_string()
            }
            Self::LearnableNormal { std } => format!("learnable_normal-{}", std),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Construction parameters of [`SpoterEncoder`](super::encoder::SpoterEncoder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Raw feature dimension of each frame
    #[serde(default = "default_data_dim")]
    pub data_dim: usize,

    /// The embedding dimension
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,

    /// Longest sequence the positional table can address
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Number of attention heads, must divide `hidden_dim`
    #[serde(default = "default_nhead")]
    pub nhead: usize,

    /// Number of encoder layers, each consisting of
    /// a multi-head attention and a feed-forward block
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,

    /// Positional encoding name, see [`PositionalEncodingKind::from_name`]
    #[serde(default = "default_pos_encoding")]
    pub pos_encoding: String,

    /// Inner width of the feed-forward blocks
    #[serde(default = "default_d_ff")]
    pub d_ff: usize,

    #[serde(default = "default_dropout")]
    pub dropout: f64,

    /// Apply layer norm before attention/feed-forward instead of after
    #[serde(default)]
    pub norm_first: bool,

    /// Re-draw mask and pad tokens from N(0, 0.2^2) right after construction
    #[serde(default)]
    pub normal_token_init: bool,

    /// Base seed for parameter initialisation
    #[serde(default)]
    pub seed: u64,
}

fn default_data_dim() -> usize { 110 }
fn default_hidden_dim() -> usize { 256 }
fn default_max_frames() -> usize { 256 }
fn default_nhead() -> usize { 8 }
fn default_num_layers() -> usize { 6 }
fn default_pos_encoding() -> String { "learnable_uniform".to_string() }
fn default_d_ff() -> usize { 2048 }
fn default_dropout() -> f64 { 0.1 }

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            data_dim: default_data_dim(),
            hidden_dim: default_hidden_dim(),
            max_frames: default_max_frames(),
            nhead: default_nhead(),
            num_layers: default_num_layers(),
            pos_encoding: default_pos_encoding(),
            d_ff: default_d_ff(),
            dropout: default_dropout(),
            norm_first: false,
            normal_token_init: false,
            seed: 0,
        }
    }
}

impl EncoderConfig {
    pub fn new(data_dim: usize, hidden_dim: usize) -> Self {
        Self {
            data_dim,
            hidden_dim,
            ..Self::default()
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_nhead(mut self, nhead: usize) -> Self {
        self.nhead = nhead;
        self
    }

    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_pos_encoding(mut self, name: impl Into<String>) -> Self {
        self.pos_encoding = name.into();
        self
    }

    pub fn with_d_ff(mut self, d_ff: usize) -> Self {
        self.d_ff = d_ff;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_normal_token_init(mut self, normal_token_init: bool) -> Self {
        self.normal_token_init = normal_token_init;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve the positional encoding name.
    pub fn positional_encoding_kind(&self) -> Result<PositionalEncodingKind, EncoderError> {
        PositionalEncodingKind::from_name(&self.pos_encoding)
    }

    /// Validate consistency of configuration
    pub fn validate(&self) -> Result<(), EncoderError> {
        for (name, value) in [
            ("data_dim", self.data_dim),
            ("hidden_dim", self.hidden_dim),
            ("nhead", self.nhead),
            ("num_layers", self.num_layers),
            ("d_ff", self.d_ff),
        ] {
            if value == 0 {
                return Err(EncoderError::ZeroDimension { name });
            }
        }

        if self.hidden_dim % self.nhead != 0 {
            return Err(EncoderError::HeadDimensionMismatch {
                hidden_dim: self.hidden_dim,
                nhead: self.nhead,
            });
        }

        let kind = self.positional_encoding_kind()?;
        if kind.is_enabled() && self.max_frames == 0 {
            return Err(EncoderError::ZeroDimension { name: "max_frames" });
        }

        Ok(())
    }
}
