/// Address identicons ("blockies")
///
/// Deterministic 8x8 mirrored pixel pattern and three HSL colours seeded from
/// the lowercased address, compatible with the common ethereum-blockies
/// layout. Cached per address with no expiry.
use super::config::{blockie_capacity, CacheOptions};
use super::manager::{ItemCache, ItemProducer};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const BLOCKIE_SIZE: usize = 8;
const BLOCKIE_SCALE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Blockie {
    pub address: String,
    pub color: String,
    pub background: String,
    pub spot: String,
    /// Row-major cells: 0 background, 1 colour, 2 spot colour
    pub cells: Vec<u8>,
}

/// xorshift generator seeded from the address characters
struct SeedRandom {
    seed: [i32; 4],
}

impl SeedRandom {
    fn new(seed: &str) -> Self {
        let mut state = [0i32; 4];
        for (i, unit) in seed.encode_utf16().enumerate() {
            let slot = state[i % 4];
            state[i % 4] = slot
                .wrapping_shl(5)
                .wrapping_sub(slot)
                .wrapping_add(unit as i32);
        }
        Self { seed: state }
    }

    fn next(&mut self) -> f64 {
        let t = self.seed[0] ^ self.seed[0].wrapping_shl(11);
        self.seed[0] = self.seed[1];
        self.seed[1] = self.seed[2];
        self.seed[2] = self.seed[3];
        self.seed[3] = self.seed[3] ^ (self.seed[3] >> 19) ^ t ^ (t >> 8);
        (self.seed[3] as u32) as f64 / 2_147_483_648.0
    }

    fn color(&mut self) -> String {
        let hue = (self.next() * 360.0).floor();
        let saturation = self.next() * 60.0 + 40.0;
        let lightness = (self.next() + self.next() + self.next() + self.next()) * 25.0;
        format!("hsl({},{}%,{}%)", hue, saturation, lightness)
    }

    fn cells(&mut self, size: usize) -> Vec<u8> {
        let data_width = (size + 1) / 2;
        let mirror_width = size - data_width;
        let mut cells = Vec::with_capacity(size * size);

        for _ in 0..size {
            let mut row: Vec<u8> = (0..data_width)
                .map(|_| (self.next() * 2.3).floor() as u8)
                .collect();
            let mirrored: Vec<u8> = row[..mirror_width].iter().rev().copied().collect();
            row.extend(mirrored);
            cells.extend(row);
        }
        cells
    }
}

impl Blockie {
    pub fn generate(address: &str) -> Self {
        let address = address.to_lowercase();
        let mut random = SeedRandom::new(&address);

        let color = random.color();
        let background = random.color();
        let spot = random.color();
        let cells = random.cells(BLOCKIE_SIZE);

        Self {
            address,
            color,
            background,
            spot,
            cells,
        }
    }

    pub fn to_svg(&self) -> String {
        let side = BLOCKIE_SIZE * BLOCKIE_SCALE;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{side}" height="{side}" viewBox="0 0 {side} {side}"><rect width="{side}" height="{side}" fill="{}"/>"#,
            self.background
        );

        for (index, cell) in self.cells.iter().enumerate() {
            let fill = match cell {
                1 => &self.color,
                2 => &self.spot,
                _ => continue,
            };
            let x = (index % BLOCKIE_SIZE) * BLOCKIE_SCALE;
            let y = (index / BLOCKIE_SIZE) * BLOCKIE_SCALE;
            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{BLOCKIE_SCALE}" height="{BLOCKIE_SCALE}" fill="{fill}"/>"#
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    /// `data:` URI suitable for an `<img src>`
    pub fn data_uri(&self) -> String {
        format!("data:image/svg+xml;base64,{}", STANDARD.encode(self.to_svg()))
    }
}

struct BlockieProducer;

impl ItemProducer<Blockie> for BlockieProducer {
    fn produce(&self, keys: Vec<String>) -> Box<dyn Iterator<Item = (String, Blockie)> + Send> {
        Box::new(keys.into_iter().map(|key| {
            let blockie = Blockie::generate(&key);
            (key, blockie)
        }))
    }
}

/// Identicon cache keyed by lowercased address
#[derive(Clone)]
pub struct BlockieCache {
    cache: Arc<ItemCache<Blockie>>,
    min_size: usize,
}

impl BlockieCache {
    pub fn new(min_size: usize, items_per_page: usize) -> Self {
        Self {
            cache: ItemCache::new(
                "blockies",
                Arc::new(BlockieProducer),
                CacheOptions::blockies(min_size, items_per_page),
            ),
            min_size,
        }
    }

    /// Cached identicon, or `None` while it is being generated
    pub fn get(&self, address: &str) -> Option<Blockie> {
        if address.is_empty() {
            return None;
        }
        self.cache.retrieve(&address.to_lowercase())
    }

    pub async fn get_async(&self, address: &str) -> Option<Blockie> {
        if address.is_empty() {
            return None;
        }
        self.cache.retrieve_async(&address.to_lowercase()).await
    }

    pub fn is_pending(&self, address: &str) -> bool {
        self.cache.is_pending(&address.to_lowercase())
    }

    /// Track the table page size setting
    pub fn follow_items_per_page(&self, items_per_page: watch::Receiver<usize>) -> JoinHandle<()> {
        let min_size = self.min_size;
        self.cache
            .follow_capacity(items_per_page, move |per_page| blockie_capacity(min_size, per_page))
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic_and_case_insensitive() {
        let lower = Blockie::generate("0x52bc44d5378309ee2abf1539bf71de1b7d7be3b5");
        let mixed = Blockie::generate("0x52BC44D5378309EE2abf1539bf71de1b7d7be3b5");
        assert_eq!(lower, mixed);

        let other = Blockie::generate("0x0000000000000000000000000000000000000001");
        assert_ne!(lower.cells, other.cells);
    }

    #[test]
    fn test_cells_are_mirrored() {
        let blockie = Blockie::generate("0xdeadbeef");
        assert_eq!(blockie.cells.len(), BLOCKIE_SIZE * BLOCKIE_SIZE);
        assert!(blockie.cells.iter().all(|cell| *cell <= 2));

        for row in blockie.cells.chunks(BLOCKIE_SIZE) {
            let reversed: Vec<u8> = row.iter().rev().copied().collect();
            assert_eq!(row, reversed.as_slice());
        }
    }

    #[test]
    fn test_svg_rendering() {
        let blockie = Blockie::generate("0xdeadbeef");
        let svg = blockie.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(&blockie.background));
        assert!(blockie.data_uri().starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn test_cache_keys_are_lowercased() {
        let cache = BlockieCache::new(200, 10);
        assert_eq!(cache.capacity(), 200);

        let first = cache.get_async("0xABCDEF").await.unwrap();
        let second = cache.get("0xabcdef").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.address, "0xabcdef");
    }

    #[tokio::test]
    async fn test_empty_address_has_no_blockie() {
        let cache = BlockieCache::new(200, 10);
        assert_eq!(cache.get(""), None);
        assert_eq!(cache.get_async("").await, None);
    }

    #[tokio::test]
    async fn test_capacity_tracks_page_size() {
        let cache = BlockieCache::new(200, 10);
        let (tx, rx) = watch::channel(10usize);
        let _follower = cache.follow_items_per_page(rx);

        tx.send(100).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(cache.capacity(), 300);
    }
}
