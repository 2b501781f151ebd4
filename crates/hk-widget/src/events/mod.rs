mod widget_sink;

pub use widget_sink::{RenderCallback, WidgetEventSink};
