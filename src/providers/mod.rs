pub mod eastmoney;
pub mod sina;
pub mod util;

pub use eastmoney::{EastmoneyHistoryProvider, EastmoneyHoldingsProvider};
pub use sina::SinaQuoteProvider;
