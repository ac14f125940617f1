//! Offline solo mode: one seeded run of a jump-diffusion stock against a
//! single player.
//!
//! A run lasts a fixed number of ticks. Headlines drawn from a small pool bias
//! the drift for a while, and the player may hold one long or short position
//! at a time. Everything derives from the seed, so a seed replays the same run.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;
use statrs::statistics::Statistics;
use tracing::{debug, info};

/// Market headline that biases drift while it is the latest one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewsEvent {
    pub headline: &'static str,
    pub effect: f64,
}

pub const NEWS_POOL: [NewsEvent; 6] = [
    NewsEvent { headline: "Central bank cuts rates", effect: 2.0 },
    NewsEvent { headline: "Earthquake disrupts supply chains", effect: -2.0 },
    NewsEvent { headline: "AI chip breakthrough lifts tech", effect: 1.6 },
    NewsEvent { headline: "Short seller publishes bearish report", effect: -1.0 },
    NewsEvent { headline: "Oil output cut stokes inflation fears", effect: 1.0 },
    NewsEvent { headline: "Quant fund blowup rattles the market", effect: -1.8 },
];

/// Parameters of one run. Volatility, jump probability and news bias are drawn
/// from the seed.
#[derive(Debug, Clone)]
pub struct SoloConfig {
    pub initial_cash: f64,
    pub initial_price: f64,
    pub price_floor: f64,

    /// Shares per position
    pub position_size: f64,

    pub base_drift: f64,
    pub volatility: f64,
    pub jump_probability: f64,

    /// Drift added per unit of headline effect
    pub news_bias: f64,

    pub tick_ms: u64,
    pub run_secs: u64,
    pub news_secs: u64,

    /// Fraction of notional reserved to open a short
    pub margin_rate: f64,
}

impl SoloConfig {
    pub fn from_rng<R: Rng>(rng: &mut R) -> Self {
        Self {
            initial_cash: 10_000.0,
            initial_price: 100.0,
            price_floor: 0.5,
            position_size: 100.0,
            base_drift: 0.0003,
            volatility: 0.02 + rng.gen::<f64>() * 0.02,
            jump_probability: 0.02 + rng.gen::<f64>() * 0.05,
            news_bias: 0.05 + rng.gen::<f64>() * 0.1,
            tick_ms: 600,
            run_secs: 60,
            news_secs: 20,
            margin_rate: 0.5,
        }
    }

    pub fn total_ticks(&self) -> u64 {
        (self.run_secs * 1000) / self.tick_ms.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    pub kind: PositionKind,
    pub shares: f64,
    pub entry_price: f64,
    /// Cash reserved for a short; zero for longs.
    pub margin: f64,
}

/// What the player asks for. Each action toggles its own position kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoloAction {
    /// Open a long when flat, sell it when long.
    Buy,
    /// Open a short when flat, cover it when short.
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeOutcome {
    Opened(PositionKind),
    Closed { kind: PositionKind, proceeds: f64 },
    Rejected(&'static str),
}

/// Position held for a whole headless run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum HoldStrategy {
    #[default]
    None,
    Long,
    Short,
}

/// A single solo run in progress.
pub struct SoloGame {
    config: SoloConfig,
    rng: StdRng,
    normal: Normal,
    price: f64,
    prev_price: f64,
    cash: f64,
    position: Option<OpenPosition>,
    active_news: Option<NewsEvent>,
    headlines: Vec<(u64, NewsEvent)>,
    forced_covers: u32,
    ticks: u64,
}

impl SoloGame {
    pub fn new(seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = SoloConfig::from_rng(&mut rng);
        let normal = Normal::new(0.0, 1.0).map_err(|e| anyhow!("Invalid normal distribution: {}", e))?;

        let mut game = Self {
            price: config.initial_price,
            prev_price: config.initial_price,
            cash: config.initial_cash,
            config,
            rng,
            normal,
            position: None,
            active_news: None,
            headlines: Vec::new(),
            forced_covers: 0,
            ticks: 0,
        };
        game.draw_news();
        Ok(game)
    }

    /// A five digit seed, the form players share.
    pub fn random_seed() -> u64 {
        rand::thread_rng().gen_range(10_000..100_000)
    }

    pub fn config(&self) -> &SoloConfig {
        &self.config
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    pub fn trade(&mut self, action: SoloAction) -> TradeOutcome {
        match (action, self.position.map(|p| p.kind)) {
            (SoloAction::Buy, None) => self.open(PositionKind::Long),
            (SoloAction::Buy, Some(PositionKind::Long)) => self.close(),
            (SoloAction::Short, None) => self.open(PositionKind::Short),
            (SoloAction::Short, Some(PositionKind::Short)) => self.close(),
            (SoloAction::Buy, Some(PositionKind::Short)) => TradeOutcome::Rejected("cover the short first"),
            (SoloAction::Short, Some(PositionKind::Long)) => TradeOutcome::Rejected("sell the long first"),
        }
    }

    fn open(&mut self, kind: PositionKind) -> TradeOutcome {
        let shares = self.config.position_size;
        let notional = self.price * shares;

        let (outlay, margin) = match kind {
            PositionKind::Long => (notional, 0.0),
            PositionKind::Short => {
                let margin = notional * self.config.margin_rate;
                (margin, margin)
            }
        };
        if self.cash < outlay {
            return TradeOutcome::Rejected("insufficient cash");
        }

        self.cash -= outlay;
        self.position = Some(OpenPosition {
            kind,
            shares,
            entry_price: self.price,
            margin,
        });
        debug!(kind = ?kind, price = self.price, "Solo position opened");
        TradeOutcome::Opened(kind)
    }

    fn close(&mut self) -> TradeOutcome {
        let Some(position) = self.position.take() else {
            return TradeOutcome::Rejected("no open position");
        };

        let proceeds = match position.kind {
            PositionKind::Long => self.price * position.shares,
            PositionKind::Short => position.margin + self.unrealized_pnl_of(&position),
        };
        self.cash += proceeds;
        debug!(kind = ?position.kind, price = self.price, proceeds, "Solo position closed");
        TradeOutcome::Closed {
            kind: position.kind,
            proceeds,
        }
    }

    /// Advance the price one tick. Covers a short whose loss has eaten its
    /// margin.
    pub fn tick(&mut self) {
        let dt = self.config.tick_ms as f64 / 1000.0 / 3600.0;
        let effect = self.active_news.map(|n| n.effect).unwrap_or(0.0);
        let drift = self.config.base_drift + effect * self.config.news_bias;

        let z: f64 = self.rng.sample(self.normal);
        let jump = if self.rng.gen::<f64>() < self.config.jump_probability {
            1.0 + (self.rng.gen::<f64>() - 0.5) * 0.05
        } else {
            1.0
        };
        let pct = drift * dt + self.config.volatility * dt.sqrt() * z;

        self.prev_price = self.price;
        self.price = (self.price * (1.0 + pct) * jump).max(self.config.price_floor);
        self.ticks += 1;

        if let Some(position) = self.position {
            if position.kind == PositionKind::Short && -self.unrealized_pnl_of(&position) > position.margin {
                self.forced_covers += 1;
                info!(price = self.price, "Short force-covered");
                self.close();
            }
        }
    }

    /// Replace the active headline with a fresh draw from the pool.
    pub fn draw_news(&mut self) {
        let event = NEWS_POOL[self.rng.gen_range(0..NEWS_POOL.len())];
        self.active_news = Some(event);
        self.headlines.push((self.ticks, event));
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.position
            .as_ref()
            .map(|p| self.unrealized_pnl_of(p))
            .unwrap_or(0.0)
    }

    fn unrealized_pnl_of(&self, position: &OpenPosition) -> f64 {
        match position.kind {
            PositionKind::Long => (self.price - position.entry_price) * position.shares,
            PositionKind::Short => (position.entry_price - self.price) * position.shares,
        }
    }

    /// Cash plus the liquidation value of the open position.
    pub fn total_assets(&self) -> f64 {
        match &self.position {
            None => self.cash,
            Some(p) if p.kind == PositionKind::Long => self.cash + self.price * p.shares,
            Some(p) => self.cash + p.margin + self.unrealized_pnl_of(p),
        }
    }

    pub fn pnl(&self) -> f64 {
        self.total_assets() - self.config.initial_cash
    }

    /// Meta currency earned: one coin per full 1000 of profit.
    pub fn coins(&self) -> u64 {
        (self.pnl() / 1000.0).floor().max(0.0) as u64
    }
}

/// Result of a headless run.
#[derive(Debug, Clone)]
pub struct SoloSummary {
    pub seed: u64,
    pub hold: HoldStrategy,
    pub ticks: u64,
    pub volatility: f64,
    pub jump_probability: f64,
    pub news_bias: f64,
    pub headlines: Vec<(u64, NewsEvent)>,
    pub final_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_return: f64,
    pub return_std_dev: f64,
    /// Largest peak-to-trough fall of the price, as a fraction
    pub max_drawdown: f64,
    pub final_assets: f64,
    pub final_cash: f64,
    /// Mark-to-market P&L of the position still open at the end
    pub open_pnl: f64,
    pub pnl: f64,
    pub coins: u64,
    pub forced_covers: u32,
}

impl std::fmt::Display for SoloSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", " SOLO RUN ")?;
        writeln!(f)?;
        writeln!(f, "Seed:        #{}", self.seed)?;
        writeln!(f, "Strategy:    {:?}", self.hold)?;
        writeln!(f, "Ticks:       {}", self.ticks)?;
        writeln!(f, "Volatility:  {:.4}", self.volatility)?;
        writeln!(f, "Jump Prob:   {:.4}", self.jump_probability)?;
        writeln!(f, "News Bias:   {:.4}", self.news_bias)?;
        writeln!(f)?;
        writeln!(f, "--- Headlines ---")?;
        for (tick, news) in &self.headlines {
            writeln!(f, "  tick {:>3}: {} ({:+.1})", tick, news.headline, news.effect)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Price ---")?;
        writeln!(f, "Final:       ${:.2}", self.final_price)?;
        writeln!(f, "Range:       ${:.2} - ${:.2}", self.min_price, self.max_price)?;
        writeln!(f, "Mean Return: {:.5}%", self.mean_return * 100.0)?;
        writeln!(f, "Std Dev:     {:.5}%", self.return_std_dev * 100.0)?;
        writeln!(f, "Drawdown:    {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(f)?;
        writeln!(f, "--- Player ---")?;
        writeln!(f, "Assets:      ${:.0}", self.final_assets)?;
        writeln!(f, "Cash:        ${:.0}", self.final_cash)?;
        writeln!(f, "Open P&L:    {:+.0}", self.open_pnl)?;
        writeln!(f, "P&L:         {}${:.0}", if self.pnl >= 0.0 { "+" } else { "-" }, self.pnl.abs())?;
        writeln!(f, "Coins:       +{}", self.coins)?;
        writeln!(f, "Force Covers: {}", self.forced_covers)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Play one full run without pacing, holding `hold` from the opening tick.
pub fn simulate(seed: u64, hold: HoldStrategy) -> Result<SoloSummary> {
    let mut game = SoloGame::new(seed)?;

    match hold {
        HoldStrategy::None => {}
        HoldStrategy::Long => {
            game.trade(SoloAction::Buy);
        }
        HoldStrategy::Short => {
            game.trade(SoloAction::Short);
        }
    }

    let total_ticks = game.config.total_ticks();
    let news_every_ms = game.config.news_secs * 1000;
    let run_ms = game.config.run_secs * 1000;

    let mut prices = Vec::with_capacity(total_ticks as usize + 1);
    prices.push(game.price);

    for tick in 1..=total_ticks {
        let before = tick.saturating_sub(1) * game.config.tick_ms;
        let now = tick * game.config.tick_ms;
        // A headline is due whenever a news boundary falls inside this tick.
        if news_every_ms > 0 && now < run_ms && now / news_every_ms > before / news_every_ms {
            game.draw_news();
        }
        game.tick();
        prices.push(game.price);
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let (mean_return, return_std_dev) = if returns.len() >= 2 {
        (returns.iter().mean(), returns.iter().std_dev())
    } else {
        (0.0, 0.0)
    };

    let summary = SoloSummary {
        seed,
        hold,
        ticks: game.ticks,
        volatility: game.config.volatility,
        jump_probability: game.config.jump_probability,
        news_bias: game.config.news_bias,
        headlines: game.headlines.clone(),
        final_price: game.price,
        min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
        max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_return,
        return_std_dev,
        max_drawdown: max_drawdown(&prices),
        final_assets: game.total_assets(),
        final_cash: game.cash(),
        open_pnl: game.unrealized_pnl(),
        pnl: game.pnl(),
        coins: game.coins(),
        forced_covers: game.forced_covers,
    };

    info!(seed, pnl = summary.pnl, coins = summary.coins, "Solo run finished");
    Ok(summary)
}

fn max_drawdown(series: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0f64;
    for &value in series {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_config_ranges() {
        for seed in [1, 42, 12345, 99999] {
            let game = SoloGame::new(seed).unwrap();
            let cfg = game.config();
            assert!((0.02..0.04).contains(&cfg.volatility));
            assert!((0.02..0.07).contains(&cfg.jump_probability));
            assert!((0.05..0.15).contains(&cfg.news_bias));
            assert_eq!(cfg.total_ticks(), 100);
            assert!(game.active_news.is_some());
        }
    }

    #[test]
    fn test_random_seed_is_five_digits() {
        for _ in 0..20 {
            let seed = SoloGame::random_seed();
            assert!((10_000..100_000).contains(&seed));
        }
    }

    #[test]
    fn test_same_seed_replays() {
        let a = simulate(777, HoldStrategy::Long).unwrap();
        let b = simulate(777, HoldStrategy::Long).unwrap();
        assert_eq!(a.final_price, b.final_price);
        assert_eq!(a.pnl, b.pnl);
        assert_eq!(a.headlines, b.headlines);

        let c = simulate(778, HoldStrategy::Long).unwrap();
        assert_ne!(a.final_price, c.final_price);
    }

    #[test]
    fn test_headline_schedule() {
        let summary = simulate(5, HoldStrategy::None).unwrap();
        // One at the open, then at 20 s and 40 s.
        assert_eq!(summary.headlines.len(), 3);
        assert_eq!(summary.ticks, 100);
    }

    #[test]
    fn test_price_floor() {
        let mut game = SoloGame::new(9).unwrap();
        game.config.volatility = 200.0;
        game.price = 0.6;
        for _ in 0..200 {
            game.tick();
            assert!(game.price() >= 0.5);
        }
    }

    #[test]
    fn test_long_round_trip() {
        let mut game = SoloGame::new(1).unwrap();
        assert_eq!(game.trade(SoloAction::Buy), TradeOutcome::Opened(PositionKind::Long));
        assert!(close(game.cash(), 0.0));
        assert!(close(game.total_assets(), 10_000.0));

        game.price = 110.0;
        assert!(close(game.unrealized_pnl(), 1_000.0));
        assert!(close(game.total_assets(), 11_000.0));
        assert_eq!(game.trade(SoloAction::Short), TradeOutcome::Rejected("sell the long first"));

        game.trade(SoloAction::Buy);
        assert!(game.position().is_none());
        assert!(close(game.cash(), 11_000.0));
        assert_eq!(game.coins(), 1);
    }

    #[test]
    fn test_short_round_trip() {
        let mut game = SoloGame::new(1).unwrap();
        assert_eq!(game.trade(SoloAction::Short), TradeOutcome::Opened(PositionKind::Short));
        assert!(close(game.cash(), 5_000.0));
        assert!(close(game.total_assets(), 10_000.0));

        game.price = 90.0;
        assert!(close(game.total_assets(), 11_000.0));

        match game.trade(SoloAction::Short) {
            TradeOutcome::Closed { kind, proceeds } => {
                assert_eq!(kind, PositionKind::Short);
                assert!(close(proceeds, 6_000.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(close(game.cash(), 11_000.0));
    }

    #[test]
    fn test_insufficient_cash() {
        let mut game = SoloGame::new(1).unwrap();
        game.price = 101.0;
        assert_eq!(game.trade(SoloAction::Buy), TradeOutcome::Rejected("insufficient cash"));
        assert!(game.position().is_none());
    }

    #[test]
    fn test_forced_cover() {
        let mut game = SoloGame::new(3).unwrap();
        game.trade(SoloAction::Short);
        // Loss at 160 is 6000 against a 5000 margin.
        game.price = 160.0;
        game.config.volatility = 0.0;
        game.config.jump_probability = 0.0;
        game.tick();

        assert!(game.position().is_none());
        assert_eq!(game.forced_covers, 1);
        assert!(game.cash() < 5_000.0);
    }

    #[test]
    fn test_coins_never_negative() {
        let mut game = SoloGame::new(1).unwrap();
        game.trade(SoloAction::Buy);
        game.price = 50.0;
        assert!(game.pnl() < 0.0);
        assert_eq!(game.coins(), 0);
    }

    #[test]
    fn test_summary_statistics() {
        let summary = simulate(2024, HoldStrategy::None).unwrap();
        assert!(summary.min_price <= summary.final_price);
        assert!(summary.max_price >= summary.final_price);
        assert!(summary.return_std_dev >= 0.0);
        assert!((0.0..=1.0).contains(&summary.max_drawdown));
        assert!(close(summary.final_assets, 10_000.0));
        assert!(close(summary.final_cash, 10_000.0));
        assert!(close(summary.open_pnl, 0.0));
        assert_eq!(summary.coins, 0);
        assert!(summary.to_string().contains("SOLO RUN"));
    }

    #[test]
    fn test_max_drawdown() {
        assert!(close(max_drawdown(&[100.0, 120.0, 90.0, 110.0]), 0.25));
        assert!(close(max_drawdown(&[1.0, 2.0, 3.0]), 0.0));
        assert!(close(max_drawdown(&[]), 0.0));
    }
}
