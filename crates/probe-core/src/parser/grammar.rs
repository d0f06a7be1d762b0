// pest-generated parser for probe scripts; `Rule` is derived from probe.pest
#[derive(pest_derive::Parser)]
#[grammar = "parser/probe.pest"]
pub struct ProbeGrammar;
