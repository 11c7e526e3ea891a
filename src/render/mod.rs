use crate::assets::{AssetError, AssetManager, TextureHandle};
use crate::chart::hitobject::{HitObject, HitObjectKind};
use crate::config;

/// Parameters of one sprite draw call, in the order the sprite-batch
/// collaborator expects them: position, draw origin, base size, scale,
/// rotation, source rectangle, flips.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteParams {
    pub x: f32,
    pub y: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub src_x: i32,
    pub src_y: i32,
    pub src_w: i32,
    pub src_h: i32,
    pub flip_x: bool,
    pub flip_y: bool,
}

/// The external renderer adapter. Hit objects compute screen-space
/// coordinates themselves and push draw calls through this; everything
/// past that point (batching, GPU upload) is someone else's problem.
pub trait SpriteBatch {
    fn set_color(&mut self, color: [f32; 4]);
    fn draw(&mut self, texture: TextureHandle, params: &SpriteParams);
}

/// Texture handles for the hit-object glyphs, resolved once from the
/// asset manager and passed into every render call.
#[derive(Clone, Copy, Debug)]
pub struct Skin {
    pub circle: TextureHandle,
    pub drumroll: TextureHandle,
    pub spinner: TextureHandle,
}

impl Skin {
    pub fn from_assets(assets: &AssetManager) -> Result<Self, AssetError> {
        Ok(Self {
            circle: assets.texture_handle("editor:hitcircle")?,
            drumroll: assets.texture_handle("editor:drumroll")?,
            spinner: assets.texture_handle("editor:spinner")?,
        })
    }
}

/// Chart time to screen-space x. `view_scale` is pixels per millisecond.
#[inline]
pub fn time_to_x(time: i32, playback: i32, view_scale: f32, origin_x: f32) -> f32 {
    origin_x + (time - playback) as f32 * view_scale
}

fn anchor_params(x: f32, y: f32, scale: f32) -> SpriteParams {
    SpriteParams {
        x,
        y,
        origin_x: config::CIRCLE_OFFSET,
        origin_y: config::CIRCLE_OFFSET,
        width: config::CIRCLE_SIZE,
        height: config::CIRCLE_SIZE,
        scale_x: scale,
        scale_y: scale,
        rotation: 0.0,
        src_x: 0,
        src_y: 0,
        src_w: config::CIRCLE_SIZE as i32,
        src_h: config::CIRCLE_SIZE as i32,
        flip_x: false,
        flip_y: false,
    }
}

fn draw_anchor(
    batch: &mut dyn SpriteBatch,
    texture: TextureHandle,
    time: i32,
    playback: i32,
    view_scale: f32,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
) {
    let x = time_to_x(time, playback, view_scale, origin_x) - config::CIRCLE_OFFSET;
    batch.draw(texture, &anchor_params(x, origin_y, scale));
}

/// Draws one hit object on the timeline row at `origin_y`. Pure: reads
/// the object and issues draw calls, nothing else. Culling is the
/// caller's job; objects with a tail draw it first so the head lands on
/// top when the two anchors are close.
pub fn render(
    object: &HitObject,
    batch: &mut dyn SpriteBatch,
    skin: &Skin,
    playback: i32,
    view_scale: f32,
    origin_x: f32,
    origin_y: f32,
) {
    match object.kind {
        HitObjectKind::Circle => {
            let color = if object.whistle || object.clap {
                config::KAT_COLOR
            } else {
                config::DON_COLOR
            };
            let scale = if object.finish {
                config::LARGE_SCALE
            } else {
                config::NORMAL_SCALE
            };
            batch.set_color(color);
            draw_anchor(
                batch, skin.circle, object.time, playback, view_scale, origin_x, origin_y, scale,
            );
        }
        HitObjectKind::Drumroll { .. } => {
            let scale = if object.finish {
                config::LARGE_SCALE
            } else {
                config::NORMAL_SCALE
            };
            batch.set_color(config::DRUMROLL_COLOR);
            draw_anchor(
                batch,
                skin.drumroll,
                object.end_time(),
                playback,
                view_scale,
                origin_x,
                origin_y,
                scale,
            );
            draw_anchor(
                batch, skin.drumroll, object.time, playback, view_scale, origin_x, origin_y, scale,
            );
        }
        HitObjectKind::Spinner { .. } => {
            batch.set_color(config::SPINNER_COLOR);
            draw_anchor(
                batch,
                skin.spinner,
                object.end_time(),
                playback,
                view_scale,
                origin_x,
                origin_y,
                config::LARGE_SCALE,
            );
            draw_anchor(
                batch,
                skin.spinner,
                object.time,
                playback,
                view_scale,
                origin_x,
                origin_y,
                config::LARGE_SCALE,
            );
        }
    }
}

/// Captures draw calls instead of issuing them. Lets the geometry be
/// checked without a graphics context; also handy for draw-order
/// debugging in the editor itself.
#[derive(Default)]
pub struct RecordingBatch {
    color: [f32; 4],
    pub calls: Vec<RecordedCall>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedCall {
    pub texture: TextureHandle,
    pub params: SpriteParams,
    pub color: [f32; 4],
}

impl SpriteBatch for RecordingBatch {
    fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    fn draw(&mut self, texture: TextureHandle, params: &SpriteParams) {
        self.calls.push(RecordedCall {
            texture,
            params: *params,
            color: self.color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::HitObject;
    use pretty_assertions::assert_eq;

    fn test_skin() -> Skin {
        Skin {
            circle: TextureHandle(0),
            drumroll: TextureHandle(1),
            spinner: TextureHandle(2),
        }
    }

    #[test]
    fn spinner_draws_tail_then_head() {
        let spinner = HitObject::decode("256,192,1000,12,0,5000").unwrap();
        let mut batch = RecordingBatch::default();

        render(&spinner, &mut batch, &test_skin(), 1000, 1.0, 100.0, 240.0);

        assert_eq!(batch.calls.len(), 2);
        let tail = &batch.calls[0];
        let head = &batch.calls[1];
        assert_eq!(tail.params.x, 100.0 + 5000.0 - config::CIRCLE_OFFSET);
        assert_eq!(head.params.x, 100.0 - config::CIRCLE_OFFSET);
        assert_eq!(tail.params.y, 240.0);
        assert_eq!(head.params.y, 240.0);
        assert_eq!(head.params.scale_x, config::LARGE_SCALE);
        assert_eq!(head.color, config::SPINNER_COLOR);
    }

    #[test]
    fn view_scale_converts_time_to_pixels() {
        let spinner = HitObject::decode("256,192,2000,8,0,1000").unwrap();
        let mut batch = RecordingBatch::default();

        render(&spinner, &mut batch, &test_skin(), 0, 0.5, 0.0, 0.0);

        assert_eq!(batch.calls[0].params.x, 3000.0 * 0.5 - config::CIRCLE_OFFSET);
        assert_eq!(batch.calls[1].params.x, 2000.0 * 0.5 - config::CIRCLE_OFFSET);
    }

    #[test]
    fn anchors_use_fixed_source_rect_and_no_rotation() {
        let spinner = HitObject::decode("256,192,0,8,0,600").unwrap();
        let mut batch = RecordingBatch::default();

        render(&spinner, &mut batch, &test_skin(), 0, 1.0, 0.0, 0.0);

        for call in &batch.calls {
            assert_eq!(call.params.src_x, 0);
            assert_eq!(call.params.src_w, config::CIRCLE_SIZE as i32);
            assert_eq!(call.params.rotation, 0.0);
            assert!(!call.params.flip_x && !call.params.flip_y);
        }
    }

    #[test]
    fn rim_circles_use_the_rim_color() {
        let kat = HitObject::decode("64,192,500,1,2").unwrap();
        let mut batch = RecordingBatch::default();
        render(&kat, &mut batch, &test_skin(), 0, 1.0, 0.0, 0.0);

        assert_eq!(batch.calls.len(), 1);
        assert_eq!(batch.calls[0].color, config::KAT_COLOR);
        assert_eq!(batch.calls[0].params.scale_x, config::NORMAL_SCALE);
    }

    #[test]
    fn big_circles_draw_at_the_large_scale() {
        let big_don = HitObject::decode("64,192,500,1,4").unwrap();
        let mut batch = RecordingBatch::default();
        render(&big_don, &mut batch, &test_skin(), 0, 1.0, 0.0, 0.0);

        assert_eq!(batch.calls[0].color, config::DON_COLOR);
        assert_eq!(batch.calls[0].params.scale_x, config::LARGE_SCALE);
    }

    #[test]
    fn drumroll_head_overlaps_its_tail() {
        let drumroll = HitObject::decode("96,192,2500,2,0,L|256:192,1,140").unwrap();
        let mut batch = RecordingBatch::default();
        render(&drumroll, &mut batch, &test_skin(), 2500, 1.0, 50.0, 0.0);

        assert_eq!(batch.calls.len(), 2);
        // duration is 0 without timing context: both anchors coincide and
        // the head is the later draw
        assert_eq!(batch.calls[0].params.x, batch.calls[1].params.x);
        assert_eq!(batch.calls[1].params.x, 50.0 - config::CIRCLE_OFFSET);
    }
}
