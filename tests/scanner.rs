#[cfg(test)]
mod scanner_tests {
    use fern::scanner::*;
    use fern::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})?:",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::QUESTION, "?"),
                (TokenType::COLON, ":"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_operators() {
        assert_token_sequence(
            "! != = == < <= > >= / -",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::MINUS, "-"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "var x = nil; while (true) break;",
            &[
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::EQUAL, "="),
                (TokenType::NIL, "nil"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::WHILE, "while"),
                (TokenType::LEFT_PAREN, "("),
                (TokenType::TRUE, "true"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::BREAK, "break"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_class_keywords() {
        assert_token_sequence(
            "class B < A { init() { super.init(); this.x = 1; } }",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::IDENTIFIER, "B"),
                (TokenType::LESS, "<"),
                (TokenType::IDENTIFIER, "A"),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::IDENTIFIER, "init"),
                (TokenType::LEFT_PAREN, "("),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::SUPER, "super"),
                (TokenType::DOT, "."),
                (TokenType::IDENTIFIER, "init"),
                (TokenType::LEFT_PAREN, "("),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::THIS, "this"),
                (TokenType::DOT, "."),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::EQUAL, "="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_literals() {
        let scanner = Scanner::new(b"\"hello\" 12 3.5");
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), 4);

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "hello"),
            other => panic!("expected string literal, got {:?}", other),
        }
        match &tokens[1].token_type {
            TokenType::NUMBER(n) => assert_eq!(*n, 12.0),
            other => panic!("expected number literal, got {:?}", other),
        }
        match &tokens[2].token_type {
            TokenType::NUMBER(n) => assert_eq!(*n, 3.5),
            other => panic!("expected number literal, got {:?}", other),
        }
        assert_eq!(tokens[3].token_type, TokenType::EOF);
    }

    #[test]
    fn test_scanner_06_comments_are_skipped() {
        assert_token_sequence(
            "1 // rest of the line\n+ /* inline */ 2",
            &[
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::PLUS, "+"),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_07_block_comments_nest() {
        assert_token_sequence(
            "1 /* outer /* inner */ still comment */ 2",
            &[
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_08_unterminated_block_comment() {
        let scanner = Scanner::new(b"1 /* never closed");
        let results: Vec<_> = scanner.collect();

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 1, "Expected 1 error message");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unterminated comment"),
                "Error message should mention the unterminated comment, got: {}",
                err
            );
        }
    }

    #[test]
    fn test_scanner_09_multiline_string_tracks_lines() {
        let scanner = Scanner::new(b"\"a\nb\"\nx");
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\nb"),
            other => panic!("expected string literal, got {:?}", other),
        }

        // 'x' sits on line 3: the string spans lines 1-2.
        assert_eq!(tokens[1].token_type, TokenType::IDENTIFIER);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_scanner_10_unexpected_chars_continue() {
        let source = ",.$(#";
        let scanner = Scanner::new(source.as_bytes());

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // We expect this sequence:
        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        // Helper function
        fn assert_token_matches(
            result: &Result<Token, fern::error::FernError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }
}
