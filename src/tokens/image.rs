use crate::data::Detail;

const BASE_TOKENS: u64 = 85;
const TILE_TOKENS: u64 = 170;
const TILE_SIZE: u64 = 512;
const MAX_SIDE: u64 = 2048;

/// Vision token cost of one image using the OpenAI tiling formula
pub fn estimate_image_tokens(width: u32, height: u32, detail: Detail) -> u64 {
    if detail == Detail::Low {
        return BASE_TOKENS;
    }

    let (mut w, mut h) = (u64::from(width), u64::from(height));
    let longest = w.max(h);
    if longest > MAX_SIDE {
        w = w * MAX_SIDE / longest;
        h = h * MAX_SIDE / longest;
    }

    let tiles = w.div_ceil(TILE_SIZE) * h.div_ceil(TILE_SIZE);
    BASE_TOKENS + TILE_TOKENS * tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_1024_high() {
        assert_eq!(estimate_image_tokens(1024, 1024, Detail::High), 765);
    }

    #[test]
    fn single_tile() {
        assert_eq!(estimate_image_tokens(512, 512, Detail::High), 255);
        assert_eq!(estimate_image_tokens(1, 1, Detail::High), 255);
    }

    #[test]
    fn low_detail_is_constant() {
        assert_eq!(estimate_image_tokens(100, 100, Detail::Low), 85);
        assert_eq!(estimate_image_tokens(8000, 8000, Detail::Low), 85);
    }

    #[test]
    fn oversized_side_is_scaled_down() {
        // 4096x1024 -> 2048x512 -> 4x1 tiles
        assert_eq!(estimate_image_tokens(4096, 1024, Detail::High), 765);
        // 1024x3000 -> 699x2048 -> 2x4 tiles
        assert_eq!(estimate_image_tokens(1024, 3000, Detail::High), 85 + 170 * 8);
    }

    #[test]
    fn boundary_at_exactly_2048() {
        assert_eq!(estimate_image_tokens(2048, 2048, Detail::High), 85 + 170 * 16);
        assert_eq!(estimate_image_tokens(513, 512, Detail::High), 85 + 170 * 2);
    }
}
