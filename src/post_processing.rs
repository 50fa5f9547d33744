//! Post-processing effects and the runtime effect stack.
//!
//! Every effect is described by one entry in a static dispatch table: the
//! shader fragment entry point that implements it, the auxiliary texture it
//! samples (if any), and the function that fills in its parameters. Adding
//! an effect means adding a variant and a table entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::post_params::{EffectContext, PostProcessState};

/// Unique identifier for a post-processing effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Straight copy of the source surface.
    #[default]
    None,
    VColourGradient,
    HlsGradient,
    FullScreenBlur,
    GaussianBlur,
    UnderWater,
    Retro,
    Bloom,
    Burn,
    Distort,
    GreyNoise,
    Spiral,
    Tint,
}

impl PostProcess {
    /// Every effect, in table order.
    pub const ALL: [PostProcess; 13] = [
        PostProcess::None,
        PostProcess::VColourGradient,
        PostProcess::HlsGradient,
        PostProcess::FullScreenBlur,
        PostProcess::GaussianBlur,
        PostProcess::UnderWater,
        PostProcess::Retro,
        PostProcess::Bloom,
        PostProcess::Burn,
        PostProcess::Distort,
        PostProcess::GreyNoise,
        PostProcess::Spiral,
        PostProcess::Tint,
    ];

    /// Stable snake_case identifier (matches the serde name).
    pub fn id(self) -> &'static str {
        match self {
            PostProcess::None => "none",
            PostProcess::VColourGradient => "v_colour_gradient",
            PostProcess::HlsGradient => "hls_gradient",
            PostProcess::FullScreenBlur => "full_screen_blur",
            PostProcess::GaussianBlur => "gaussian_blur",
            PostProcess::UnderWater => "under_water",
            PostProcess::Retro => "retro",
            PostProcess::Bloom => "bloom",
            PostProcess::Burn => "burn",
            PostProcess::Distort => "distort",
            PostProcess::GreyNoise => "grey_noise",
            PostProcess::Spiral => "spiral",
            PostProcess::Tint => "tint",
        }
    }

    /// Parse an identifier. Case-insensitive; `-` is accepted for `_`.
    pub fn from_id(id: &str) -> Option<Self> {
        let normalized = id.trim().to_lowercase().replace('-', "_");
        PostProcess::ALL.into_iter().find(|effect| effect.id() == normalized)
    }

    pub fn is_none(self) -> bool {
        self == PostProcess::None
    }

    /// Dispatch table entry for this effect.
    pub fn entry(self) -> &'static EffectEntry {
        &EFFECT_TABLE[self as usize]
    }
}

impl fmt::Display for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Dispatch table
// ============================================================================

/// Secondary texture an effect samples next to the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuxTexture {
    /// Tileable grey noise.
    Noise,
    /// Height map the burn front climbs.
    Burn,
    /// 2D offset vectors in R and G.
    Distort,
}

impl AuxTexture {
    pub const ALL: [AuxTexture; 3] = [AuxTexture::Noise, AuxTexture::Burn, AuxTexture::Distort];
}

/// Fills in an effect's fields of the parameter block before its draw.
pub type PopulateFn = fn(&mut PostProcessState, &EffectContext);

/// Everything needed to run one effect.
pub struct EffectEntry {
    pub effect: PostProcess,
    pub name: &'static str,
    pub description: &'static str,
    /// Fragment entry point in the post-processing shader module.
    pub fragment_entry: &'static str,
    pub aux_texture: Option<AuxTexture>,
    pub populate: PopulateFn,
}

impl fmt::Debug for EffectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectEntry")
            .field("effect", &self.effect)
            .field("fragment_entry", &self.fragment_entry)
            .field("aux_texture", &self.aux_texture)
            .finish()
    }
}

/// Indexed by `PostProcess as usize`.
static EFFECT_TABLE: [EffectEntry; 13] = [
    EffectEntry {
        effect: PostProcess::None,
        name: "Copy",
        description: "Copies the source surface unchanged",
        fragment_entry: "fs_copy",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::VColourGradient,
        name: "Vertical Colour Gradient",
        description: "Tints the image with a top-to-bottom colour ramp",
        fragment_entry: "fs_v_colour_gradient",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::HlsGradient,
        name: "HLS Gradient",
        description: "Rotates hue along the vertical axis, animated over time",
        fragment_entry: "fs_hls_gradient",
        aux_texture: None,
        populate: PostProcessState::populate_hls_gradient,
    },
    EffectEntry {
        effect: PostProcess::FullScreenBlur,
        name: "Box Blur",
        description: "Uniform 3x3 blur",
        fragment_entry: "fs_full_screen_blur",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::GaussianBlur,
        name: "Gaussian Blur",
        description: "Weighted 5x5 blur",
        fragment_entry: "fs_gaussian_blur",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::UnderWater,
        name: "Underwater",
        description: "Wavy blue-green distortion, animated over time",
        fragment_entry: "fs_under_water",
        aux_texture: None,
        populate: PostProcessState::populate_under_water,
    },
    EffectEntry {
        effect: PostProcess::Retro,
        name: "Retro",
        description: "Pixelates and posterizes the image",
        fragment_entry: "fs_retro",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::Bloom,
        name: "Bloom",
        description: "Adds glow around bright areas",
        fragment_entry: "fs_bloom",
        aux_texture: None,
        populate: PostProcessState::populate_nothing,
    },
    EffectEntry {
        effect: PostProcess::Burn,
        name: "Burn",
        description: "A burning front climbs a height map, cycling",
        fragment_entry: "fs_burn",
        aux_texture: Some(AuxTexture::Burn),
        populate: PostProcessState::populate_burn,
    },
    EffectEntry {
        effect: PostProcess::Distort,
        name: "Distort",
        description: "Cut-glass distortion from a vector map",
        fragment_entry: "fs_distort",
        aux_texture: Some(AuxTexture::Distort),
        populate: PostProcessState::populate_distort,
    },
    EffectEntry {
        effect: PostProcess::GreyNoise,
        name: "Grey Noise",
        description: "Greyscale with flickering static",
        fragment_entry: "fs_grey_noise",
        aux_texture: Some(AuxTexture::Noise),
        populate: PostProcessState::populate_grey_noise,
    },
    EffectEntry {
        effect: PostProcess::Spiral,
        name: "Spiral",
        description: "Twists the image around its centre, animated over time",
        fragment_entry: "fs_spiral",
        aux_texture: None,
        populate: PostProcessState::populate_spiral,
    },
    EffectEntry {
        effect: PostProcess::Tint,
        name: "Tint",
        description: "Multiplies the image by a flat colour",
        fragment_entry: "fs_tint",
        aux_texture: None,
        populate: PostProcessState::populate_tint,
    },
];

/// The whole dispatch table, in `PostProcess::ALL` order.
pub fn effect_table() -> &'static [EffectEntry] {
    &EFFECT_TABLE
}

// ============================================================================
// Effect stack
// ============================================================================

/// Ordered list of full-screen effects requested at runtime.
///
/// Effects accumulate across frames until explicitly cleared; iterating the
/// stack never consumes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectStack {
    effects: Vec<PostProcess>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect to the end of the stack.
    /// `PostProcess::None` is ignored; returns whether anything was added.
    pub fn append(&mut self, effect: PostProcess) -> bool {
        if effect.is_none() {
            return false;
        }
        self.effects.push(effect);
        true
    }

    /// Remove every queued effect.
    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Queued effects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = PostProcess> + '_ {
        self.effects.iter().copied()
    }

    pub fn as_slice(&self) -> &[PostProcess] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl<'a> IntoIterator for &'a EffectStack {
    type Item = PostProcess;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, PostProcess>>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.iter().copied()
    }
}

impl FromIterator<PostProcess> for EffectStack {
    fn from_iter<I: IntoIterator<Item = PostProcess>>(iter: I) -> Self {
        let mut stack = EffectStack::new();
        for effect in iter {
            stack.append(effect);
        }
        stack
    }
}
