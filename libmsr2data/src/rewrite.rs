use super::constants::{COMMENT_CHAR, FUNCTION_DELIMITERS, MAP_PREFIX, PARAM_PREFIX};
use super::map_table::resolve_map_slot;
use super::param_sort::Remap;
use super::run_block::RunBlock;

fn is_theory_delimiter(c: char) -> bool {
    c.is_whitespace()
}

fn is_function_delimiter(c: char) -> bool {
    c.is_whitespace() || FUNCTION_DELIMITERS.contains(&c)
}

/// Apply `rewrite` to every token of `line`, keeping the delimiters exactly as they were.
///
/// `rewrite` receives the index of the token within the line and the token itself and returns
/// a replacement, or None to keep the token.
fn rewrite_tokens(
    line: &str,
    is_delimiter: impl Fn(char) -> bool,
    mut rewrite: impl FnMut(usize, &str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut token_start: Option<usize> = None;
    let mut token_index = 0;
    let mut flush = |start: usize, end: usize, out: &mut String, token_index: &mut usize| {
        let token = &line[start..end];
        match rewrite(*token_index, token) {
            Some(new) => out.push_str(&new),
            None => out.push_str(token),
        }
        *token_index += 1;
    };
    for (idx, c) in line.char_indices() {
        if is_delimiter(c) {
            if let Some(start) = token_start.take() {
                flush(start, idx, &mut out, &mut token_index);
            }
            out.push(c);
        } else if token_start.is_none() {
            token_start = Some(idx);
        }
    }
    if let Some(start) = token_start {
        flush(start, line.len(), &mut out, &mut token_index);
    }
    out
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT_CHAR)
}

/// A THEORY token naming a parameter directly: a bare positive integer
fn theory_param_number(token: &str) -> Option<usize> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// A FUNCTIONS token naming a parameter directly: `par` followed by digits
fn function_param_number(token: &str) -> Option<usize> {
    token.strip_prefix(PARAM_PREFIX).and_then(theory_param_number)
}

/// Direct parameter numbers referenced by a THEORY line (the first token is the function name)
pub fn theory_param_refs(line: &str) -> Vec<usize> {
    if is_comment(line) {
        return vec![];
    }
    line.split(is_theory_delimiter)
        .filter(|t| !t.is_empty())
        .skip(1)
        .filter_map(theory_param_number)
        .collect()
}

/// Direct parameter numbers referenced by a FUNCTIONS line
pub fn function_param_refs(line: &str) -> Vec<usize> {
    if is_comment(line) {
        return vec![];
    }
    line.split(is_function_delimiter)
        .filter_map(function_param_number)
        .collect()
}

enum Resolved {
    Param(usize),
    Map(usize),
}

/// Renumbers the parameter references of the blocks shared by all runs (THEORY and FUNCTIONS).
///
/// Global references follow the sort order, run specific ones are turned into `mapN`
/// indirections through the map tables of the template RUN blocks.
pub struct ReferenceRewriter<'a> {
    remap: &'a Remap,
    template_blocks: &'a mut [RunBlock],
    n_converted: usize,
}

impl<'a> ReferenceRewriter<'a> {
    pub fn new(remap: &'a Remap, template_blocks: &'a mut [RunBlock]) -> Self {
        Self {
            remap,
            template_blocks,
            n_converted: 0,
        }
    }

    /// Number of run specific references that were converted to map slots so far
    pub fn n_converted(&self) -> usize {
        self.n_converted
    }

    pub fn rewrite_theory(&mut self, lines: &mut [String]) {
        for line in lines.iter_mut() {
            *line = self.rewrite_theory_line(line);
        }
    }

    pub fn rewrite_functions(&mut self, lines: &mut [String]) {
        for line in lines.iter_mut() {
            *line = self.rewrite_function_line(line);
        }
    }

    pub fn rewrite_theory_line(&mut self, line: &str) -> String {
        if is_comment(line) {
            return line.to_string();
        }
        rewrite_tokens(line, is_theory_delimiter, |idx, token| {
            if idx == 0 {
                return None;
            }
            let old = theory_param_number(token)?;
            Some(match self.resolve(old, "THEORY", line)? {
                Resolved::Param(new) => new.to_string(),
                Resolved::Map(slot) => format!("{MAP_PREFIX}{slot}"),
            })
        })
    }

    pub fn rewrite_function_line(&mut self, line: &str) -> String {
        if is_comment(line) {
            return line.to_string();
        }
        rewrite_tokens(line, is_function_delimiter, |_, token| {
            let old = function_param_number(token)?;
            Some(match self.resolve(old, "FUNCTIONS", line)? {
                Resolved::Param(new) => format!("{PARAM_PREFIX}{new}"),
                Resolved::Map(slot) => format!("{MAP_PREFIX}{slot}"),
            })
        })
    }

    fn resolve(&mut self, old: usize, block: &str, line: &str) -> Option<Resolved> {
        // Unknown numbers are constants, not references
        let renumbered = self.remap.get(old)?;
        if renumbered.is_global {
            return Some(Resolved::Param(renumbered.number));
        }
        let slot = resolve_map_slot(self.template_blocks, old);
        self.n_converted += 1;
        log::warn!(
            "Run specific parameter {old} is used directly in the {block} block (line: {}); it is replaced by map{slot} so that it varies per run",
            line.trim()
        );
        Some(Resolved::Map(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_sort::sort_parameters;
    use crate::parameter::{classify_parameters, Parameter};
    use crate::run_block::MapSlot;

    fn remap_for(names: &[&str], run: &str) -> Remap {
        let mut params: Vec<Parameter> = names
            .iter()
            .enumerate()
            .map(|(i, n)| Parameter::new(i + 1, n, 0.0, 0.1))
            .collect();
        classify_parameters(&mut params, run).unwrap();
        sort_parameters(&mut params)
    }

    #[test]
    fn test_rewrite_tokens_keeps_spacing() {
        let out = rewrite_tokens("a  b\tc", is_theory_delimiter, |i, _| {
            (i == 1).then(|| "X".to_string())
        });
        assert_eq!(out, "a  X\tc");
    }

    #[test]
    fn test_theory_globals_follow_sort_and_specifics_become_maps() {
        // 1: asym0100 (specific), 2: alpha, 3: rate0100 (specific), 4: field
        let remap = remap_for(&["asym0100", "alpha", "rate0100", "field"], "0100");
        let mut block = RunBlock::new("run0100");
        block.map = vec![MapSlot::new(3), MapSlot::default()];
        let mut blocks = vec![block];
        let mut rewriter = ReferenceRewriter::new(&remap, &mut blocks);

        assert_eq!(rewriter.rewrite_theory_line("asymmetry 1"), "asymmetry map2");
        assert_eq!(
            rewriter.rewrite_theory_line("simplExpo 3   (rate)"),
            "simplExpo map1   (rate)"
        );
        assert_eq!(
            rewriter.rewrite_theory_line("TFieldCos 4 fun1 map1"),
            "TFieldCos 2 fun1 map1"
        );
        assert_eq!(rewriter.rewrite_theory_line("+"), "+");
        assert_eq!(rewriter.n_converted(), 2);
        assert_eq!(blocks[0].map_target(2), 1);
    }

    #[test]
    fn test_comment_lines_are_not_rewritten() {
        let remap = remap_for(&["asym0100", "alpha"], "0100");
        let mut blocks = vec![RunBlock::new("run0100")];
        let mut rewriter = ReferenceRewriter::new(&remap, &mut blocks);
        assert_eq!(
            rewriter.rewrite_theory_line("# asymmetry 1 is per run"),
            "# asymmetry 1 is per run"
        );
        assert_eq!(rewriter.rewrite_function_line("  # par2 fixed"), "  # par2 fixed");
        assert_eq!(rewriter.n_converted(), 0);
        assert!(theory_param_refs("# simplExpo 2").is_empty());
    }

    #[test]
    fn test_theory_first_token_and_unknown_numbers_untouched() {
        let remap = remap_for(&["a", "b"], "0100");
        let mut blocks = vec![RunBlock::new("run0100")];
        let mut rewriter = ReferenceRewriter::new(&remap, &mut blocks);
        assert_eq!(rewriter.rewrite_theory_line("2 1 17 0"), "2 1 17 0");
    }

    #[test]
    fn test_functions_rewrite() {
        // 1: amp100 (specific), 2: phase, 3: width100 (specific)
        let remap = remap_for(&["amp100", "phase", "width100"], "100");
        let mut block = RunBlock::new("run100");
        block.map = vec![MapSlot::new(3)];
        let mut blocks = vec![block];
        let mut rewriter = ReferenceRewriter::new(&remap, &mut blocks);

        assert_eq!(
            rewriter.rewrite_function_line("fun1 = par2*(par3 + 1.5e-3)"),
            "fun1 = par1*(map1 + 1.5e-3)"
        );
        assert_eq!(
            rewriter.rewrite_function_line("fun2 = par1+par3"),
            "fun2 = map2+map1"
        );
        assert_eq!(
            rewriter.rewrite_function_line("fun3 = par9 + parx + map1"),
            "fun3 = par9 + parx + map1"
        );
    }

    #[test]
    fn test_reference_extraction() {
        assert_eq!(theory_param_refs("asymmetry 1 map2 3 (x)"), vec![1, 3]);
        assert_eq!(theory_param_refs("17"), Vec::<usize>::new());
        assert_eq!(function_param_refs("fun1 = par1*(map1+par12)/par"), vec![1, 12]);
    }
}
