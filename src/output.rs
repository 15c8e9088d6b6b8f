//! Output formatting for transformed queries and stage feedback

use crate::query::{CompositeClause, JoinClause, QueryFeedback, QueryNode};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const INDENT: &str = "  ";

/// Print a query as an indented tree, one node per line
pub fn print_query(query: &QueryNode, color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    print_node(&mut stdout, query, 0)
}

fn print_node(stdout: &mut StandardStream, node: &QueryNode, depth: usize) -> io::Result<()> {
    write!(stdout, "{}", INDENT.repeat(depth))?;

    match node {
        QueryNode::Term { text } => writeln!(stdout, "{}", text),
        QueryNode::Phrase { field, value } => {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(stdout, "{}", field)?;
            stdout.reset()?;
            writeln!(stdout, ":{}", value)
        }
        QueryNode::And { clauses } => print_branch(stdout, "AND", clauses, depth),
        QueryNode::Or { clauses } => print_branch(stdout, "OR", clauses, depth),
        QueryNode::Not { clause } => {
            print_operator(stdout, "NOT")?;
            writeln!(stdout)?;
            print_node(stdout, clause, depth + 1)
        }
        QueryNode::Sub { query, params } => {
            print_operator(stdout, "SUB")?;
            // Parameters are hidden by the canonical rendering, so the tree
            // view is the one place they show up.
            for (name, value) in params {
                write!(stdout, " {}={}", name, value)?;
            }
            writeln!(stdout)?;
            print_node(stdout, query, depth + 1)
        }
        QueryNode::AccessControl { query } => {
            print_operator(stdout, "ACL")?;
            writeln!(stdout)?;
            print_node(stdout, query, depth + 1)
        }
        QueryNode::Boost { query, boost } => {
            print_operator(stdout, "BOOST")?;
            writeln!(stdout, " {}", boost)?;
            print_node(stdout, query, depth + 1)
        }
        QueryNode::Join { query, clauses } => {
            print_operator(stdout, "JOIN")?;
            writeln!(stdout)?;
            print_node(stdout, query, depth + 1)?;
            for clause in clauses {
                print_join_clause(stdout, clause, depth + 1)?;
            }
            Ok(())
        }
        QueryNode::CompositeJoin {
            query,
            from_query,
            field,
            clauses,
        } => {
            print_operator(stdout, "COMPOSITE")?;
            write!(stdout, " on=")?;
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(stdout, "{}", field)?;
            stdout.reset()?;
            writeln!(stdout)?;
            print_node(stdout, query, depth + 1)?;
            write!(stdout, "{}", INDENT.repeat(depth + 1))?;
            print_operator(stdout, "FROM")?;
            writeln!(stdout)?;
            print_node(stdout, from_query, depth + 2)?;
            for clause in clauses {
                print_composite_clause(stdout, clause, depth + 1)?;
            }
            Ok(())
        }
    }
}

fn print_branch(
    stdout: &mut StandardStream,
    label: &str,
    clauses: &[QueryNode],
    depth: usize,
) -> io::Result<()> {
    print_operator(stdout, label)?;
    writeln!(stdout)?;
    for clause in clauses {
        print_node(stdout, clause, depth + 1)?;
    }
    Ok(())
}

fn print_join_clause(
    stdout: &mut StandardStream,
    clause: &JoinClause,
    depth: usize,
) -> io::Result<()> {
    write!(stdout, "{}", INDENT.repeat(depth))?;
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "{}", clause.mode)?;
    stdout.reset()?;
    write!(stdout, " on=")?;
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    write!(stdout, "{}:{}", clause.from_field, clause.to_field)?;
    stdout.reset()?;
    print_clause_attrs(stdout, clause.boost, clause.rollup_limit, clause.facet)?;
    writeln!(stdout)?;
    print_node(stdout, &clause.query, depth + 1)
}

fn print_composite_clause(
    stdout: &mut StandardStream,
    clause: &CompositeClause,
    depth: usize,
) -> io::Result<()> {
    write!(stdout, "{}", INDENT.repeat(depth))?;
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "{}", clause.mode)?;
    stdout.reset()?;
    print_clause_attrs(stdout, clause.boost, clause.rollup_limit, clause.facet)?;
    writeln!(stdout)?;
    print_node(stdout, &clause.query, depth + 1)
}

/// Attributes that differ from the clause defaults, as ` key=value` suffixes
fn print_clause_attrs(
    stdout: &mut StandardStream,
    boost: i32,
    rollup_limit: Option<i64>,
    facet: bool,
) -> io::Result<()> {
    if boost != 0 {
        write!(stdout, " boost={}", boost)?;
    }
    if let Some(limit) = rollup_limit {
        write!(stdout, " rollup={}", limit)?;
    }
    if !facet {
        write!(stdout, " facet=false")?;
    }
    Ok(())
}

fn print_operator(stdout: &mut StandardStream, label: &str) -> io::Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    write!(stdout, "{}", label)?;
    stdout.reset()
}

/// Print stage feedback, one `[component] name: message` line per entry
pub fn print_feedback(entries: &[QueryFeedback], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    for entry in entries {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(stdout, "[{}]", entry.component)?;
        stdout.reset()?;
        write!(stdout, " ")?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{}", entry.name)?;
        stdout.reset()?;
        writeln!(stdout, ": {}", entry.message)?;
    }

    Ok(())
}

/// Print a response-router decision
pub fn print_routing(workflow: Option<&str>, color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    match workflow {
        Some(name) => {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(stdout, "resubmit")?;
            stdout.reset()?;
            writeln!(stdout, ": {}", name)?;
        }
        None => writeln!(stdout, "final")?,
    }

    Ok(())
}
