use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Instant;

const SPARKS: [char; 6] = ['*', '+', '·', '✦', '✧', '°'];

/// One glyph of the milestone animation
#[derive(Debug, Clone)]
pub struct Spark {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
    /// Letters settle into the banner text; loose sparks drift upward
    pub target: Option<(f64, f64)>,
}

impl Spark {
    fn loose<R: Rng>(x: f64, y: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-2.0..2.0),
            vel_y: rng.gen_range(-3.0..-0.5),
            symbol: *SPARKS.choose(rng).unwrap_or(&'*'),
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(1.5..3.5),
            target: None,
        }
    }

    fn letter<R: Rng>(from: (f64, f64), to: (f64, f64), symbol: char, rng: &mut R) -> Self {
        Self {
            x: from.0,
            y: from.1,
            vel_x: to.0 - from.0,
            vel_y: to.1 - from.1,
            symbol,
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(3.0..4.5),
            target: Some(to),
        }
    }

    pub fn is_letter(&self) -> bool {
        self.target.is_some()
    }

    /// Returns false once the spark has burnt out
    fn update(&mut self, dt: f64) -> bool {
        match self.target {
            Some((tx, ty)) => {
                if ((tx - self.x).powi(2) + (ty - self.y).powi(2)).sqrt() > 0.5 {
                    self.x += self.vel_x * dt;
                    self.y += self.vel_y * dt;
                    self.vel_x *= 0.95;
                    self.vel_y *= 0.95;
                } else {
                    self.x = tx;
                    self.y = ty;
                }
            }
            None => {
                // breath rising: sparks float up and slow down
                self.x += self.vel_x * dt;
                self.y += self.vel_y * dt;
                self.vel_y *= 0.97;
            }
        }
        self.age += dt;
        self.age < self.max_age
    }
}

/// Banner animation played when a streak milestone is reached
#[derive(Debug)]
pub struct MilestoneCelebration {
    pub sparks: Vec<Spark>,
    pub banner: String,
    pub is_active: bool,
    started_at: Instant,
    duration_secs: f64,
    width: f64,
    height: f64,
}

impl Default for MilestoneCelebration {
    fn default() -> Self {
        Self {
            sparks: Vec::new(),
            banner: String::new(),
            is_active: false,
            started_at: Instant::now(),
            duration_secs: 4.0,
            width: 80.0,
            height: 24.0,
        }
    }
}

impl MilestoneCelebration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn banner_for(days: u32) -> String {
        format!("{days} DAY STREAK!")
    }

    pub fn start(&mut self, days: u32, width: u16, height: u16) {
        let mut rng = rand::thread_rng();
        self.sparks.clear();
        self.banner = Self::banner_for(days);
        self.started_at = Instant::now();
        self.is_active = true;
        self.width = width as f64;
        self.height = height as f64;

        let cx = self.width / 2.0;
        let cy = self.height / 2.0;
        let spacing = 2.0;
        let left = cx - (self.banner.chars().count() as f64 - 1.0) * spacing / 2.0;

        for (i, ch) in self.banner.chars().enumerate().filter(|(_, c)| *c != ' ') {
            let from = (cx + rng.gen_range(-8.0..8.0), cy + rng.gen_range(2.0..6.0));
            let to = (left + i as f64 * spacing, cy - 2.0);
            self.sparks.push(Spark::letter(from, to, ch, &mut rng));
        }
        for _ in 0..20 {
            let (x, y) = (cx + rng.gen_range(-15.0..15.0), cy + rng.gen_range(0.0..8.0));
            self.sparks.push(Spark::loose(x, y, &mut rng));
        }
    }

    pub fn update(&mut self) {
        if !self.is_active {
            return;
        }
        if self.started_at.elapsed().as_secs_f64() >= self.duration_secs {
            self.stop();
            return;
        }

        let (w, h) = (self.width, self.height);
        self.sparks.retain_mut(|spark| {
            let alive = spark.update(0.1);
            let inside = spark.is_letter()
                || (spark.y >= -2.0 && spark.y <= h + 2.0 && spark.x >= -2.0 && spark.x <= w + 2.0);
            alive && inside
        });
    }

    pub fn stop(&mut self) {
        self.is_active = false;
        self.sparks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_by_default() {
        let celebration = MilestoneCelebration::new();
        assert!(!celebration.is_active);
        assert!(celebration.sparks.is_empty());
    }

    #[test]
    fn test_start_spells_banner() {
        let mut celebration = MilestoneCelebration::new();
        celebration.start(7, 80, 24);

        assert!(celebration.is_active);
        assert_eq!(celebration.banner, "7 DAY STREAK!");
        let letters: String = celebration
            .sparks
            .iter()
            .filter(|s| s.is_letter())
            .map(|s| s.symbol)
            .collect();
        assert_eq!(letters, "7DAYSTREAK!");
        assert!(celebration.sparks.iter().any(|s| !s.is_letter()));
    }

    #[test]
    fn test_letters_settle_on_target() {
        let mut rng = rand::thread_rng();
        let mut spark = Spark::letter((0.0, 0.0), (10.0, 5.0), 'A', &mut rng);
        for _ in 0..10 {
            spark.update(0.1);
        }
        let (tx, ty) = spark.target.unwrap();
        let dist = ((tx - spark.x).powi(2) + (ty - spark.y).powi(2)).sqrt();
        assert!(dist < 5.0);
    }

    #[test]
    fn test_loose_sparks_rise() {
        let mut rng = rand::thread_rng();
        let mut spark = Spark::loose(10.0, 10.0, &mut rng);
        spark.update(0.1);
        assert!(spark.y < 10.0);
    }

    #[test]
    fn test_offscreen_sparks_removed() {
        let mut celebration = MilestoneCelebration::new();
        celebration.start(3, 20, 10);
        let mut rng = rand::thread_rng();
        celebration.sparks.push(Spark::loose(100.0, 100.0, &mut rng));

        celebration.update();
        assert!(celebration
            .sparks
            .iter()
            .all(|s| s.is_letter() || s.x <= 22.0));
    }

    #[test]
    fn test_stop_clears() {
        let mut celebration = MilestoneCelebration::new();
        celebration.start(30, 80, 24);
        celebration.stop();
        assert!(!celebration.is_active);
        assert!(celebration.sparks.is_empty());
    }
}
