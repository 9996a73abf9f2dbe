//! Routing decision table tests for `spine-router`.

use std::sync::Arc;

use rstest::rstest;
use spine_core::{AgentContract, AgentName, ContractRegistry, OutputType, ProjectId, Task};
use spine_router::{RouteRule, Router, RoutingTable};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn router() -> Router {
    Router::new(Arc::new(ContractRegistry::builtin()), RoutingTable::default()).expect("router")
}

fn task(instruction: &str) -> Task {
    Task::new(ProjectId::from("p"), instruction)
}

// ---------------------------------------------------------------------------
// Priority order
// ---------------------------------------------------------------------------

#[test]
fn explicit_agent_beats_output_type() {
    let t = task("anything")
        .with_downstream_agent("builder")
        .with_output_type(OutputType::Spec);
    let d = router().route_explained(&t);
    assert_eq!(d.agent.as_str(), "builder");
    assert_eq!(d.rule, RouteRule::Explicit);
}

#[test]
fn unregistered_explicit_agent_falls_through() {
    let t = task("please design it")
        .with_downstream_agent("oracle")
        .with_output_type(OutputType::Code);
    let d = router().route_explained(&t);
    assert_eq!(d.agent.as_str(), "builder");
    assert_eq!(d.rule, RouteRule::OutputType(OutputType::Code));
}

#[test]
fn output_type_beats_keywords() {
    let t = task("please design a new auth system").with_output_type(OutputType::Summary);
    assert_eq!(router().route(&t).as_str(), "scribe");
}

#[rstest]
#[case(OutputType::Spec, "architect")]
#[case(OutputType::Code, "builder")]
#[case(OutputType::Summary, "scribe")]
fn output_table(#[case] output: OutputType, #[case] expected: &str) {
    let t = task("asdf").with_output_type(output);
    assert_eq!(router().route(&t).as_str(), expected);
}

#[rstest]
#[case(OutputType::Diagram)]
#[case(OutputType::HandoffPacket)]
#[case(OutputType::Chat)]
fn unmapped_output_type_falls_to_keywords(#[case] output: OutputType) {
    let t = task("ingest the csv files").with_output_type(output);
    let d = router().route_explained(&t);
    assert_eq!(d.agent.as_str(), "curator");
    assert_eq!(d.rule, RouteRule::Keyword("ingest".into()));
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

#[rstest]
#[case("please design a new auth system", "architect")]
#[case("Write the README", "scribe")]
#[case("implement the retry loop", "builder")]
#[case("import last year's transcripts", "curator")]
#[case("is this migration safe?", "guardian")]
#[case("remember why we chose postgres", "continuity")]
fn keyword_fallback(#[case] instruction: &str, #[case] expected: &str) {
    assert_eq!(router().route(&task(instruction)).as_str(), expected);
}

#[rstest]
// architect is declared before builder
#[case("build the protocol", "architect", "protocol")]
// scribe before guardian, regardless of how many guardian words appear
#[case("check, validate and approve then document", "scribe", "document")]
// builder before continuity
#[case("code the memory layer", "builder", "code")]
fn ties_follow_declaration_order(#[case] instruction: &str, #[case] agent: &str, #[case] word: &str) {
    let d = router().route_explained(&task(instruction));
    assert_eq!(d.agent.as_str(), agent);
    assert_eq!(d.rule, RouteRule::Keyword(word.into()));
}

// ---------------------------------------------------------------------------
// Totality and determinism
// ---------------------------------------------------------------------------

#[rstest]
#[case("asdf qwer")]
#[case("")]
#[case("   ")]
#[case("codebase systematically")]
fn unmatched_goes_to_default(#[case] instruction: &str) {
    let d = router().route_explained(&task(instruction));
    assert_eq!(d.agent.as_str(), "scribe");
    assert_eq!(d.rule, RouteRule::Default);
}

#[test]
fn same_fields_same_route() {
    let r = router();
    let t = task("clean and check the legacy data");
    let first = r.route_explained(&t);
    for _ in 0..100 {
        assert_eq!(r.route_explained(&t.clone()), first);
    }
}

#[test]
fn configured_default_is_used() {
    let table = RoutingTable::builtin(AgentName::from("continuity"));
    let r = Router::new(Arc::new(ContractRegistry::builtin()), table).expect("router");
    assert_eq!(r.route(&task("asdf")).as_str(), "continuity");
}

#[test]
fn extra_contract_reachable_by_explicit_agent_only() {
    let mut registry = ContractRegistry::builtin();
    registry
        .register(AgentContract {
            agent_name: AgentName::from("translator"),
            role: "Translator".into(),
            primary_focus: "Localisation".into(),
            capabilities: vec![],
            preferred_input_type: vec![],
            output_type: vec![],
            upstream_agents: vec![],
            downstream_agents: vec![AgentName::from("scribe")],
            constraints: vec![],
        })
        .expect("register");
    let r = Router::new(Arc::new(registry), RoutingTable::default()).expect("router");

    let explicit = task("translate this").with_downstream_agent("translator");
    assert_eq!(r.route(&explicit).as_str(), "translator");
    assert_eq!(r.route(&task("translate this")).as_str(), "scribe");
}
