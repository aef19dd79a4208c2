// src/signals/webgl.rs
// Graphics-stack identity. Software rasterizers and virtual GPU vendors point at
// headless or virtualised hosts; a missing 3D context is only a mild penalty.

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::{GraphicsInfo, HostEnvironment};

const SOFTWARE_RENDERERS: &[&str] = &["SwiftShader", "llvmpipe"];
const VIRTUAL_VENDORS: &[&str] = &["Brian Paul", "Mesa"];

pub fn score_graphics(info: &GraphicsInfo) -> PartialVerdict {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if SOFTWARE_RENDERERS
        .iter()
        .any(|marker| info.renderer.contains(marker))
    {
        score += 0.7;
        reasons.push("Headless WebGL renderer detected".to_string());
    }

    if VIRTUAL_VENDORS.iter().any(|marker| info.vendor.contains(marker)) {
        score += 0.5;
        reasons.push("Virtual WebGL vendor detected".to_string());
    }

    PartialVerdict::scored(score, 0.8, "webgl").with_reasons(reasons)
}

pub struct WebGlCollector;

#[async_trait]
impl Collector for WebGlCollector {
    fn id(&self) -> &'static str {
        "webgl"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.graphics_info() {
            Ok(Some(info)) => score_graphics(&info),
            Ok(None) => PartialVerdict::scored(0.3, 0.4, "webgl-unsupported")
                .with_reason("WebGL not supported"),
            Err(err) => {
                tracing::debug!(error = %err, "graphics probe failed");
                PartialVerdict::scored(0.4, 0.3, "webgl-error").with_reason("WebGL detection failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::score_graphics;
    use crate::environment::GraphicsInfo;

    #[test]
    fn hardware_renderer_is_clean() {
        let info = GraphicsInfo {
            vendor: "Google Inc. (NVIDIA)".to_string(),
            renderer: "ANGLE (NVIDIA GeForce RTX 3060 Direct3D11)".to_string(),
        };
        assert_eq!(score_graphics(&info).score, Some(0.0));
    }

    #[test]
    fn swiftshader_on_mesa_stacks_both_penalties() {
        let info = GraphicsInfo {
            vendor: "Mesa/X.org".to_string(),
            renderer: "Google SwiftShader".to_string(),
        };
        let verdict = score_graphics(&info);
        assert_eq!(verdict.score, Some(0.7 + 0.5));
        assert_eq!(verdict.reasons.len(), 2);
    }
}
