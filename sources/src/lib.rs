//! Adapters for the external services behind the dashboard.
//!
//! Each adapter sits behind a small async trait so the relay can be driven by
//! fakes in tests. Adapters only fetch and decode; deciding what to broadcast
//! belongs to the relay.
//!
//! | module       | trait               | production impl   |
//! |--------------|---------------------|-------------------|
//! | [`weather`]  | `WeatherStation`, `TokenPage` | `NetatmoClient`, `WeatherMapPage` |
//! | [`quotes`]   | `QuoteSource`       | `YahooQuotes`     |
//! | [`news`]     | `NewsSource`        | `NewsApi`         |
//! | [`calendar`] | `CalendarFeed`      | `HttpCalendarFeed`|
//! | [`tibber`]   | `EnergySource`      | `TibberClient`    |
//! | [`lights`]   | `LightController`   | `HueBridge`       |
//! | [`system`]   | `CommandRunner`     | `ShellRunner`     |
//! | [`sensor`]   | (channel of levels) | `GpioSensor`      |

pub mod calendar;
pub mod error;
pub mod http;
pub mod lights;
pub mod news;
pub mod quotes;
pub mod sensor;
pub mod system;
pub mod tibber;
pub mod weather;

pub use error::{Result, SourceError};

use std::fmt;

/// Every integration the relay knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Speaker,
    Weather,
    Quotes,
    News,
    Calendar,
    Tibber,
    Tibber2,
    Lights,
    System,
    Motion,
}

/// How a source produces data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Pushes events on its own
    Push,
    /// Answers when asked
    RequestResponse,
    /// Accepts commands, produces nothing to broadcast
    CommandOnly,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Push => "push",
            Capability::RequestResponse => "request_response",
            Capability::CommandOnly => "command_only",
        }
    }
}

impl SourceId {
    pub const ALL: [SourceId; 10] = [
        SourceId::Speaker,
        SourceId::Weather,
        SourceId::Quotes,
        SourceId::News,
        SourceId::Calendar,
        SourceId::Tibber,
        SourceId::Tibber2,
        SourceId::Lights,
        SourceId::System,
        SourceId::Motion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceId::Speaker => "speaker",
            SourceId::Weather => "weather",
            SourceId::Quotes => "quotes",
            SourceId::News => "news",
            SourceId::Calendar => "calendar",
            SourceId::Tibber => "tibber",
            SourceId::Tibber2 => "tibber2",
            SourceId::Lights => "lights",
            SourceId::System => "system",
            SourceId::Motion => "motion",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            SourceId::Speaker | SourceId::Motion => Capability::Push,
            SourceId::Lights | SourceId::System => Capability::CommandOnly,
            _ => Capability::RequestResponse,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
