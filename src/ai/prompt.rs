//! Reusable prompts using Handlebars for templating. Strict mode is on
//! so a missing variable fails the render instead of silently
//! producing an incomplete prompt.

use std::fmt;

use handlebars::Handlebars;

#[derive(Debug)]
pub enum Prompt {
    SqlAgent,
    Summary,
    DirectAnswer,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const SQL_AGENT_PROMPT: &str = r"
You are an agent designed to interact with a SQL database.
Given an input question, create a syntactically correct {{dialect}} query to run, then look at the results of the query and return the answer.
Unless the user specifies a specific number of examples they wish to obtain, always limit your query to at most {{top_k}} results.
You can order the results by a relevant column to return the most interesting examples in the database.
Never query for all the columns from a specific table, only ask for the relevant columns given the question.

You have access to tools for interacting with the database. Only use the given tools and only use the information returned by the tools to construct your final answer.
If you need to query the database, use sql_db_query first when you already know the table and column names.
Only use sql_db_schema if you need to understand the table structure.
If you get an error while executing a query, rewrite the query and try again.

DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.

Do not make up information. If you cannot find the answer in the database, say so.
Be concise and always format your final answer in natural language.
";

const SUMMARY_PROMPT: &str = r"Please create a concise and well-structured summary of the following text in {{language}}, adhering to these guidelines:

1. Length: less than {{max_words}} words.
2. Style: casual + academic
3. Focus: Emphasize key arguments, main findings, critical dates
4. Use bullet points, headings, subheadings, emojis when necessary
5. Include significant quotes (shortened if needed).

Original Text:
{{text}}

Guidelines:
- Maintain factual accuracy
- Preserve important names, dates, and statistics
- Use clear, concise language
- Avoid personal opinions or interpretations
- Write only in {{language}}, with no English or repetitive text.

Summary:";

const DIRECT_ANSWER_PROMPT: &str =
    "You are a helpful assistant. Please respond to the user queries";

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text so nothing should be HTML escaped
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::SqlAgent.to_string(), SQL_AGENT_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(&Prompt::Summary.to_string(), SUMMARY_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(&Prompt::DirectAnswer.to_string(), DIRECT_ANSWER_PROMPT)
        .expect("Failed to register template");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_agent_prompt() {
        let out = templates()
            .render(
                &Prompt::SqlAgent.to_string(),
                &json!({"dialect": "MySQL", "top_k": 10}),
            )
            .unwrap();
        assert!(out.contains("syntactically correct MySQL query"));
        assert!(out.contains("at most 10 results"));
    }

    #[test]
    fn test_summary_prompt_does_not_escape() {
        let out = templates()
            .render(
                &Prompt::Summary.to_string(),
                &json!({"language": "Hindi", "max_words": 400, "text": "Turing's \"machine\" & more"}),
            )
            .unwrap();
        assert!(out.contains("summary of the following text in Hindi"));
        assert!(out.contains("less than 400 words"));
        assert!(out.contains("Turing's \"machine\" & more"));
    }

    #[test]
    fn test_strict_mode_rejects_missing_vars() {
        let result = templates().render(&Prompt::Summary.to_string(), &json!({"language": "Tamil"}));
        assert!(result.is_err());
    }
}
