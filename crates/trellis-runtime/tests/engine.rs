//! End-to-end scenarios for the full pipeline: match, sort-out, patch,
//! simplify, AST build.

mod common;

use common::*;
use trellis::error::ParseError;
use trellis_runtime::appeal::{AppealStatus, NodeHandle};
use trellis_runtime::ast::ActionTable;
use trellis_runtime::lexer::SourceLexer;
use trellis_runtime::{ParseCtx, Parser};

#[test]
fn direct_left_recursion_builds_left_leaning_tree() {
    let fix = add_fixture();
    let trees = parse(&fix, "a + b + c ;").unwrap();
    assert_eq!(trees, vec!["((a + b) + c)".to_string()]);
}

#[test]
fn direct_left_recursion_single_operand() {
    let fix = add_fixture();
    let trees = parse(&fix, "a ;").unwrap();
    assert_eq!(trees, vec!["a".to_string()]);
}

#[test]
fn indirect_left_recursion_nests_field_accesses() {
    let fix = field_access_fixture();
    let trees = parse(&fix, "this.a.b ;").unwrap();
    assert_eq!(trees, vec!["((this . a) . b)".to_string()]);
}

#[test]
fn indirect_left_recursion_base_case() {
    let fix = field_access_fixture();
    let trees = parse(&fix, "this ;").unwrap();
    assert_eq!(trees, vec!["this".to_string()]);
}

#[test]
fn multi_lead_group_parses_like_its_single_lead_twin() {
    let multi = multi_lead_fixture();
    let single = field_access_fixture();
    for src in ["this.a.b ;", "this ;", "this.a ;"] {
        let from_multi = parse(&multi, src).unwrap();
        let from_single = parse(&single, src).unwrap();
        assert_eq!(from_multi, from_single, "diverged on {src}");
    }
}

#[test]
fn non_master_lead_connects_to_master_instances() {
    let fix = multi_lead_fixture();
    let trees = parse(&fix, "this.a.b ;").unwrap();
    assert_eq!(trees, vec!["((this . a) . b)".to_string()]);
}

#[test]
fn single_oneof_takes_the_first_alternative() {
    let fix = single_fixture();
    let trees = parse(&fix, "x ;").unwrap();
    assert_eq!(trees, vec!["(return)".to_string()]);
}

#[test]
fn empty_switch_block_matches_through_nested_repetition() {
    let fix = switch_fixture();
    let trees = parse(&fix, "{ }").unwrap();
    assert_eq!(trees, vec!["(block )".to_string()]);
}

#[test]
fn switch_block_with_statements_and_labels() {
    let fix = switch_fixture();
    let trees = parse(&fix, "{ a ; b : c ; }").unwrap();
    assert_eq!(trees.len(), 1);
    assert!(trees[0].starts_with("(block"), "got {}", trees[0]);
}

#[test]
fn ambiguous_top_rule_is_fatal() {
    let fix = ambiguous_fixture();
    let err = parse(&fix, "a b").unwrap_err();
    assert!(
        matches!(err, ParseError::Ambiguity { ref ends, .. } if ends.len() == 2),
        "expected ambiguity, got {err:?}"
    );
}

#[test]
fn parenthesised_value_reads_as_cast() {
    let fix = fixup_fixture();
    let trees = parse(&fix, "( t ) x ;").unwrap();
    assert_eq!(trees, vec!["(cast t x)".to_string()]);
}

#[test]
fn trailing_unary_reads_as_binary() {
    let fix = fixup_fixture();
    let trees = parse(&fix, "a + b ;").unwrap();
    assert_eq!(trees, vec!["(a + b)".to_string()]);
}

#[test]
fn cached_subtree_is_patched_before_ast_build() {
    let fix = cached_subtree_fixture();
    let trees = parse(&fix, "a b ;").unwrap();
    assert_eq!(trees, vec!["(pass a b)".to_string()]);
}

#[test]
fn empty_input_is_a_successful_empty_parse() {
    let fix = add_fixture();
    let trees = parse(&fix, "").unwrap();
    assert!(trees.is_empty());
}

#[test]
fn comment_only_input_is_a_successful_empty_parse() {
    let fix = add_fixture();
    let trees = parse(&fix, "// nothing\n/* still\nnothing */\n").unwrap();
    assert!(trees.is_empty());
}

#[test]
fn syntax_error_reports_farthest_token() {
    let fix = add_fixture();
    let err = parse(&fix, "a + + ;").unwrap_err();
    match err {
        ParseError::Syntax { pos, .. } => {
            assert_eq!(pos.line, 1);
            assert!(pos.col >= 5, "farthest should be at or past the second '+'");
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn multiple_constructs_accumulate_trees() {
    let fix = add_fixture();
    let trees = parse(&fix, "a ;\nb + c ;\n").unwrap();
    assert_eq!(trees, vec!["a".to_string(), "(b + c)".to_string()]);
}

#[test]
fn parsing_twice_is_structurally_identical() {
    let fix = add_fixture();
    let first = parse(&fix, "a + b + c ;\nd ;\n").unwrap();
    let second = parse(&fix, "a + b + c ;\nd ;\n").unwrap();
    assert_eq!(first, second);
}

/// Walks the sorted tree checking the post-sort invariants: only
/// successful nodes, no cache placeholders after patching, contiguous
/// concatenation covers, distinct repetition starts.
fn check_sorted_invariants(ctx: &ParseCtx, node: NodeHandle) {
    let n = &ctx.arena[node];
    assert!(n.status.is_succ(), "failed node in sorted tree");
    assert!(
        !matches!(
            n.status,
            AppealStatus::SuccWasSucc | AppealStatus::SuccStillWasSucc
        ),
        "unpatched cache placeholder in sorted tree"
    );
    let is_concat = n.rule().map_or(false, |r| {
        ctx.grammar.kind(r) == trellis::grammar::RuleKind::Concatenate
    });
    let is_repeat = n.rule().map_or(false, |r| {
        ctx.grammar.kind(r) == trellis::grammar::RuleKind::ZeroOrMore
    });
    if is_concat && !n.sorted.is_empty() {
        let mut expect = n.start;
        for &child in &n.sorted {
            assert_eq!(ctx.arena[child].start, expect, "gap in concatenation cover");
            expect = ctx.arena[child].final_match.unwrap();
        }
        assert_eq!(Some(expect), n.final_match, "cover stops short of the end");
    }
    if is_repeat {
        for (i, &a) in n.sorted.iter().enumerate() {
            for &b in &n.sorted[i + 1..] {
                assert_ne!(
                    ctx.arena[a].start, ctx.arena[b].start,
                    "repetition children share a start"
                );
            }
        }
    }
    for &child in &n.sorted {
        check_sorted_invariants(ctx, child);
    }
}

#[test]
fn sorted_tree_invariants_hold_after_patching() {
    let fix = add_fixture();
    let index = fix.index();
    let mut parser = Parser::new(
        &fix.grammar,
        &index,
        ActionTable::new(ACTIONS),
        Box::new(SourceLexer::from_str("a + b + c ;")),
        "<test>",
    );
    let ctx = &mut parser.ctx;
    ctx.reset();
    assert!(ctx.buffer.lex_line(ctx.grammar) > 0);
    assert!(ctx.match_top().unwrap());
    let top = ctx.sort_out().unwrap();
    ctx.patch_was_succ(top).unwrap();
    check_sorted_invariants(ctx, top);

    // Success and failure caches stay disjoint for every rule and token.
    for rule in fix.grammar.rule_handles() {
        for token in 0..ctx.buffer.len() {
            if ctx.cache.succ(rule, token).is_some() {
                assert!(
                    !ctx.cache.was_failed(rule, token),
                    "rule cached as matched and failed at token {token}"
                );
            }
        }
    }
}
