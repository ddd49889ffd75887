/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// State change fan-out to subscribers. Must stay in submission order.
	Notify,
	/// Dashboard document rendering.
	Render,
	/// Section data fetching (command runs, remote lookups) that may block.
	Fetch,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Notify => "notify",
			Self::Render => "render",
			Self::Fetch => "fetch",
		}
	}
}
