use crate::domain::Report;
use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

/// Game providers used for the `username_game` composite.
pub const PROVIDERS: [&str; 10] = [
    "pgsoft",
    "evolution",
    "evolutionlive",
    "netent",
    "playtech",
    "pragmatic",
    "redtiger",
    "quickspin",
    "microgaming",
    "yggdrasil",
];

/// Largest backwards offset applied to `bet_time`, in minutes.
pub const MAX_BET_AGE_MINUTES: i64 = 100_000;

/// Generate `count` reports with independently randomized fields.
///
/// Uses the calling thread's RNG, so concurrent callers never share state.
pub fn generate(count: usize) -> Vec<Report> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    (0..count)
        .map(|_| {
            let username = Uuid::new_v4().to_string();
            let provider = PROVIDERS[rng.gen_range(0..PROVIDERS.len())];

            Report {
                username_game: format!("{}_{}", username, provider),
                username,
                currency: "USD".to_string(),
                winloss: rng.gen_range(-5000..5000),
                bet: rng.gen_range(0..10_000),
                turnover: rng.gen_range(0..20_000),
                payout: rng.gen::<f64>() * 100.0,
                bet_time: now - Duration::minutes(rng.gen_range(0..MAX_BET_AGE_MINUTES)),
                brand_id: format!("brand{}", rng.gen_range(0..10)),
                brand_name: format!("Brand {}", rng.gen_range(0..10)),
                game_id: format!("game{}", rng.gen_range(0..100)),
                game_name: format!("Game {}", rng.gen_range(0..100)),
                game_type: format!("type{}", rng.gen_range(0..5)),
                transaction_id: format!("tx{}", rng.gen_range(0..i64::MAX)),
                round_id: format!("round{}", rng.gen_range(0..i64::MAX)),
            }
        })
        .collect()
}
