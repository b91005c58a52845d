//! Prompt text for the `transactions` dataset.

/// Column name and description of every column the model may use.
pub const TABLE_SCHEMA: [(&str, &str); 17] = [
    ("id", "Integer primary key"),
    ("transaction_id", "String transaction identifier"),
    ("transaction_timestamp", "Timestamp of transaction"),
    ("card_id", "Integer card identifier"),
    ("expiry_date", "String card expiry date"),
    ("issuer_bank_name", "String issuer bank name"),
    ("merchant_id", "Integer merchant identifier"),
    ("merchant_mcc", "Integer merchant mcc code"),
    (
        "mcc_category",
        "String mcc category. Only these values: (Clothing & Apparel, Dining & Restaurants, \
         Electronics & Software, Fuel & Service Stations, General Retail & Department, \
         Grocery & Food Markets, Hobby, Books, Sporting Goods, Home Furnishings & Supplies, \
         Pharmacies & Health, Services (Other), Travel & Transportation, Unknown, \
         Utilities & Bill Payments)",
    ),
    (
        "merchant_city",
        "String merchant city. Example: (Astana, Almaty, Shymkent, Other)",
    ),
    (
        "transaction_type",
        "String type of transaction. Example: (ATM_WITHDRAWAL, BILL_PAYMENT, ECOM, P2P_IN, \
         P2P_OUT, POS, SALARY)",
    ),
    ("transaction_amount_kzt", "Numeric amount in KZT"),
    ("original_amount", "Numeric original amount"),
    (
        "transaction_currency",
        "String currency in ISO format. Example: (ARM, BLR, CHN, GEO, ITA, KAZ, KGZ, TUR, USA, UZB)",
    ),
    ("acquirer_country_iso", "String acquirer country ISO code"),
    (
        "pos_entry_mode",
        "String pos entry mode. Only these values: (Chip, QR_Code, Contactless, Swipe)",
    ),
    (
        "wallet_type",
        "String wallet type. Only these values: (Bank's QR, Samsung Pay, Google Pay, Apple Pay)",
    ),
];

/// Row limit the model is asked to apply when the question does not name one.
pub const DEFAULT_LIMIT: u32 = 1000;

/// Schema rendered as a JSON object, column order preserved.
pub fn schema_json() -> String {
    let schema: serde_json::Map<String, serde_json::Value> = TABLE_SCHEMA
        .iter()
        .map(|(column, description)| (column.to_string(), (*description).into()))
        .collect();
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn system_prompt() -> String {
    format!(
        r#"You are a data analyst assistant for a PostgreSQL database of card transactions.

RULES:
1. Follow the table schema and column types exactly
2. Read only: generate SELECT queries only. UPDATE, DELETE, DROP, ALTER, CREATE and INSERT are forbidden
3. If a request is risky, refuse it and explain why
4. If the request lacks context, ask a clarifying question
5. Put WHERE conditions before joins and use LIMIT {DEFAULT_LIMIT} unless the user asks otherwise
6. Use WITH for complex aggregations

All data is stored in English: city names, bank names, MCC categories,
transaction types and currencies. If the user writes in Russian or Kazakh,
translate their intent to the English values. Always output SQL with English
values.
Use table 'transactions' and lowercase column names.
Filter dates through transaction_timestamp.
Filter amounts through transaction_amount_kzt.
String filters must use ILIKE.

Table schema:
{}
"#,
        schema_json()
    )
}

pub fn format_prompt(question: &str) -> String {
    format!(
        r#"Decide the output format for the user's request.

USER_QUERY: {question}

Possible formats:
- "text": a textual answer, statistics, descriptions
- "table": tabular data, lists of transactions
- "graph": data for charts (time series, comparisons)
- "diagram": diagrams, distributions

Return JSON:
{{
    "output_format": "text|table|graph|diagram",
    "confidence_score": 0.0-1.0,
    "clarification_question": null or a question for the user,
    "refined_query": "the user's request, refined"
}}
"#
    )
}

pub fn sql_prompt(question: &str) -> String {
    format!(
        r#"USER_QUERY: {question}
SCHEMA: {schema}

Generate an optimized PostgreSQL SELECT query:
- Use the indexes on merchant_city and transaction_timestamp
- Add WHERE conditions before JOINs
- Include LIMIT {DEFAULT_LIMIT} when aggregating large datasets
- Check the query against the user's intent
- Only SELECT queries are allowed

Return JSON:
{{
    "sql_query": "string",
    "explanation": "string",
    "matches_intent": true,
    "alternative_query": null
}}
"#,
        schema = schema_json()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_columns_in_order() {
        let schema: serde_json::Value = serde_json::from_str(&schema_json()).unwrap();
        let columns: Vec<&String> = schema.as_object().unwrap().keys().collect();
        assert_eq!(columns.first().map(|c| c.as_str()), Some("id"));
        assert_eq!(columns.last().map(|c| c.as_str()), Some("wallet_type"));
        assert_eq!(columns.len(), 17);
    }

    #[test]
    fn test_prompts_carry_question() {
        assert!(sql_prompt("total spend in Almaty").contains("USER_QUERY: total spend in Almaty"));
        assert!(format_prompt("top merchants").contains("top merchants"));
        assert!(system_prompt().contains("transaction_amount_kzt"));
    }
}
