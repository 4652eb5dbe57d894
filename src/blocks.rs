use crate::html::{Element, Fragment, parse_fragment};
use crate::inline::collect_runs;
use crate::model::{Block, ListItem, Run, is_blank, runs_text};

/// What to do with a top-level element that is not a heading, paragraph or list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTagPolicy {
    /// Skip the element and its content.
    #[default]
    Drop,
    /// Keep its text as a plain paragraph.
    FallbackParagraph,
}

/// Parse editor HTML into the block sequence used by the PDF renderer.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    parse_blocks_with(html, UnknownTagPolicy::Drop)
}

pub fn parse_blocks_with(html: &str, policy: UnknownTagPolicy) -> Vec<Block> {
    blocks_from_fragment(&parse_fragment(html), policy)
}

fn blocks_from_fragment(fragment: &Fragment, policy: UnknownTagPolicy) -> Vec<Block> {
    let mut blocks = Vec::new();
    for el in fragment.elements() {
        match classify(el, policy) {
            Some(block) => blocks.push(block),
            None => log::debug!("block parser: skipping top-level <{}>", el.tag),
        }
    }
    blocks
}

fn classify(el: &Element, policy: UnknownTagPolicy) -> Option<Block> {
    if let Some(level) = el.heading_level() {
        let text = runs_text(&collect_runs(el)).trim().to_string();
        return (!text.trim().is_empty()).then_some(Block::Heading { level, text });
    }
    match el.tag.as_str() {
        "p" => paragraph(el),
        "ul" | "ol" => {
            let items: Vec<ListItem> = el
                .child_elements()
                .filter(|child| child.tag == "li")
                .map(collect_runs)
                .filter(|runs| !is_blank(runs))
                .map(|runs| ListItem { runs })
                .collect();
            (!items.is_empty()).then_some(Block::List {
                ordered: el.tag == "ol",
                items,
            })
        }
        _ => match policy {
            UnknownTagPolicy::Drop => None,
            UnknownTagPolicy::FallbackParagraph => paragraph(el),
        },
    }
}

fn paragraph(el: &Element) -> Option<Block> {
    let runs: Vec<Run> = collect_runs(el);
    (!is_blank(&runs)).then_some(Block::Paragraph { runs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_flag_follows_container() {
        let blocks = parse_blocks("<ol><li>one</li></ol><ul><li>two</li></ul>");
        assert!(matches!(blocks[0], Block::List { ordered: true, .. }));
        assert!(matches!(blocks[1], Block::List { ordered: false, .. }));
    }

    #[test]
    fn empty_list_items_are_skipped() {
        let blocks = parse_blocks("<ul><li> </li><li>kept</li></ul><ul><li></li></ul>");
        assert_eq!(blocks.len(), 1);
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 1);
    }
}
