use crate::foundation::error::LayerstackResult;
use crate::layers::Composition;
use crate::layers::selector::Selector;
use crate::layers::source::LayerSource;

/// Pick and decode one layer per source, keeping source order (first source = bottom).
///
/// Any read or decode failure abandons the whole unit.
pub fn select_layers(
    sources: &[LayerSource],
    selector: &mut dyn Selector,
) -> LayerstackResult<Composition> {
    let mut layers = Vec::with_capacity(sources.len());
    for source in sources {
        layers.push(source.read_random(selector)?);
    }
    Composition::new(layers)
}
