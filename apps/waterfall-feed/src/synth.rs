use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waterfall_stream::Rgb;

const NOISE_FLOOR: f32 = 0.22;
const CARRIER_LEVEL: f32 = 0.75;
const CARRIER_WIDTH: f32 = 3.5;

/// Synthetic spectrum rows: a noise floor with one carrier drifting across the band.
pub struct Waterfall {
    width: usize,
    carrier: f32,
    drift: f32,
    rng: StdRng,
}

impl Waterfall {
    pub fn new(width: u32, seed: u64) -> Self {
        let width = width as usize;
        Self {
            width,
            carrier: width as f32 / 3.0,
            drift: 0.6,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_row(&mut self) -> Vec<Rgb> {
        let row = (0..self.width)
            .map(|x| {
                let noise = self.rng.gen_range(0.0..NOISE_FLOOR);
                let offset = (x as f32 - self.carrier) / CARRIER_WIDTH;
                let signal = CARRIER_LEVEL * (-0.5 * offset * offset).exp();
                palette(noise + signal)
            })
            .collect();
        self.advance_carrier();
        row
    }

    fn advance_carrier(&mut self) {
        let edge = self.width.saturating_sub(1) as f32;
        self.carrier += self.drift;
        if self.carrier <= 0.0 || self.carrier >= edge {
            self.drift = -self.drift;
            self.carrier = self.carrier.clamp(0.0, edge);
        }
    }
}

/// Maps a level in `0.0..=1.0` onto black, blue, cyan, yellow, red.
pub fn palette(level: f32) -> Rgb {
    const STOPS: [(f32, [f32; 3]); 5] = [
        (0.0, [0.0, 0.0, 0.0]),
        (0.25, [0.0, 0.0, 255.0]),
        (0.5, [0.0, 255.0, 255.0]),
        (0.75, [255.0, 255.0, 0.0]),
        (1.0, [255.0, 0.0, 0.0]),
    ];
    let level = level.clamp(0.0, 1.0);
    let upper = STOPS
        .iter()
        .position(|(stop, _)| level <= *stop)
        .unwrap_or(STOPS.len() - 1)
        .max(1);
    let (lo, lo_rgb) = STOPS[upper - 1];
    let (hi, hi_rgb) = STOPS[upper];
    let t = (level - lo) / (hi - lo);
    let channel = |i: usize| (lo_rgb[i] + (hi_rgb[i] - lo_rgb[i]) * t).round() as u8;
    Rgb::new(channel(0), channel(1), channel(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness(pixel: Rgb) -> u32 {
        u32::from(pixel.r) + u32::from(pixel.g) + u32::from(pixel.b)
    }

    #[test]
    fn palette_endpoints() {
        assert_eq!(palette(0.0), Rgb::new(0, 0, 0));
        assert_eq!(palette(0.25), Rgb::new(0, 0, 255));
        assert_eq!(palette(1.0), Rgb::new(255, 0, 0));
        assert_eq!(palette(7.0), Rgb::new(255, 0, 0));
        assert_eq!(palette(-1.0), Rgb::new(0, 0, 0));
    }

    #[test]
    fn rows_have_requested_width() {
        let mut waterfall = Waterfall::new(512, 1);
        assert_eq!(waterfall.next_row().len(), 512);
        assert!(Waterfall::new(0, 1).next_row().is_empty());
    }

    #[test]
    fn carrier_stands_out_from_noise() {
        let mut waterfall = Waterfall::new(300, 7);
        let carrier = waterfall.carrier.round() as usize;
        let row = waterfall.next_row();
        assert!(brightness(row[carrier]) > brightness(row[0]));
        assert!(brightness(row[carrier]) > brightness(row[299]));
    }

    #[test]
    fn carrier_stays_in_band() {
        let mut waterfall = Waterfall::new(16, 3);
        for _ in 0..200 {
            waterfall.next_row();
            assert!((0.0..=15.0).contains(&waterfall.carrier));
        }
    }
}
