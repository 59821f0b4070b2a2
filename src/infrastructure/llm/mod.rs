mod fallback;
mod gemini;

pub use fallback::FallbackGenerator;
pub use gemini::GeminiGenerator;
