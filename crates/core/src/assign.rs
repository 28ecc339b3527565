//! Matching extracted images to slides.
//!
//! Assignment is greedy in slide order and every image is used at most once
//! per deck. The set of consumed images is an explicit [`UsedImages`] value
//! owned by the caller for the duration of one deck build.

use crate::fuzzy::partial_ratio;
use crate::normalize::words_lowercase;
use crate::types::{ImageAsset, SlideRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default minimum partial-ratio score for the fuzzy-context policy.
pub const DEFAULT_IMAGE_THRESHOLD: u8 = 70;

/// Title words shorter than this never match a file name.
const MIN_KEYWORD_LEN: usize = 3;

/// How an image is chosen for a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentPolicy {
    /// First unused image whose file name contains a word of the slide title.
    KeywordOverlap,
    /// Unused image whose context best matches the slide text, if the score
    /// reaches `threshold`.
    FuzzyContext { threshold: u8 },
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        AssignmentPolicy::FuzzyContext {
            threshold: DEFAULT_IMAGE_THRESHOLD,
        }
    }
}

/// Image paths already placed on a slide in the current deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedImages(HashSet<String>);

impl UsedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    /// Mark `path` as used; returns `false` if it already was.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.0.insert(path.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Assigns images to slides under one [`AssignmentPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ImageAssigner {
    policy: AssignmentPolicy,
}

impl ImageAssigner {
    pub fn new(policy: AssignmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AssignmentPolicy {
        self.policy
    }

    /// Fill the image field of every slide that has none.
    ///
    /// Slides that already carry an image keep it and mark it used. Images
    /// in `used` are never handed out again; `used` is updated in place.
    pub fn assign(&self, slides: &mut [SlideRecord], assets: &[ImageAsset], used: &mut UsedImages) {
        for slide in slides.iter_mut() {
            if let Some(existing) = &slide.image_path {
                used.insert(existing.clone());
                continue;
            }

            let choice = self.pick(slide, assets, used);
            if let Some(asset) = choice {
                log::debug!("Assigning image '{}' to slide '{}'", asset.path, slide.title);
                used.insert(asset.path.clone());
                slide.image_path = Some(asset.path.clone());
            }
        }
    }

    /// Keep LLM-suggested images only when they name an available, unused
    /// asset; clear every other suggestion.
    pub fn claim_suggested(
        &self,
        slides: &mut [SlideRecord],
        assets: &[ImageAsset],
        used: &mut UsedImages,
    ) {
        for slide in slides.iter_mut() {
            let Some(suggested) = slide.image_path.take() else {
                continue;
            };
            let matched = assets
                .iter()
                .find(|a| a.path == suggested || a.file_name() == file_name_of(&suggested));
            match matched {
                Some(asset) if used.insert(asset.path.clone()) => {
                    slide.image_path = Some(asset.path.clone());
                }
                _ => log::debug!(
                    "Ignoring suggested image '{}' for slide '{}'",
                    suggested,
                    slide.title
                ),
            }
        }
    }

    fn pick<'a>(
        &self,
        slide: &SlideRecord,
        assets: &'a [ImageAsset],
        used: &UsedImages,
    ) -> Option<&'a ImageAsset> {
        let mut available = assets.iter().filter(|a| !used.contains(&a.path));

        match self.policy {
            AssignmentPolicy::KeywordOverlap => {
                let keywords: Vec<String> = words_lowercase(&slide.title)
                    .into_iter()
                    .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
                    .collect();
                if keywords.is_empty() {
                    return None;
                }
                available.find(|asset| {
                    let name = asset.file_name().to_lowercase();
                    keywords.iter().any(|k| name.contains(k.as_str()))
                })
            }
            AssignmentPolicy::FuzzyContext { threshold } => {
                let slide_text =
                    format!("{} {}", slide.title, slide.bullets.join(" ")).to_lowercase();
                let mut best: Option<(&ImageAsset, u8)> = None;
                for asset in available {
                    let score = partial_ratio(&slide_text, &match_text(asset));
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((asset, score));
                    }
                }
                best.filter(|(_, score)| *score >= threshold)
                    .map(|(asset, _)| asset)
            }
        }
    }
}

/// Text an asset is matched on: its context, or its file name with
/// separators turned into spaces.
fn match_text(asset: &ImageAsset) -> String {
    match asset.context.as_deref().map(str::trim) {
        Some(context) if !context.is_empty() => context.to_lowercase(),
        _ => asset.file_name().replace(['_', '-'], " ").to_lowercase(),
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
