//! Built-in category rule table.
//!
//! Categories are listed in declaration order, which is also the tie-break order.

/// Fallback category for text that matches nothing strongly enough.
pub const OTHER_DOCUMENTS: &str = "Other Documents";

/// Category assigned to items that failed extraction or produced no text.
pub const ERRORS: &str = "Errors";

/// Built-in rules as `(category, [(pattern, weight)])`.
pub const DEFAULT_RULES: &[(&str, &[(&str, u32)])] = &[
    (
        "Tax Documents",
        &[
            (r"\bw-?[2-9]\b|\bform\s+w-?[2-9]\b", 10),
            (r"\b1099\b|\b1040\b|\b1098\b|\bschedule [a-e]\b", 10),
            (
                r"\btax return\b|\btax form\b|\btax statement\b|\btax document\b",
                8,
            ),
            (
                r"\birs\b|\btax id\b|\btaxpayer\b|\btax year\b|\btaxable\b",
                6,
            ),
            (r"\bein\b|\bssn\b|\btax identification\b", 6),
            (r"\btax\b", 3),
        ],
    ),
    (
        "Invoices",
        &[
            (
                r"\binvoice\s+number\b|\binvoice\s+#\b|\binvoice\s+no\b|\bdue date\b",
                8,
            ),
            (
                r"\bpayment\s+due\b|\bbalance\s+due\b|\binvoice\s+total\b|\bamount\s+due\b",
                7,
            ),
            (r"\binvoice\b", 5),
            (r"\bbill\b|\bbilling\b", 4),
        ],
    ),
    (
        "Receipts",
        &[
            (r"\breceipt\s+number\b|\breceipt\s+#\b|\breceipt\s+no\b", 8),
            (
                r"\bpayment\s+received\b|\btransaction\s+complete\b|\bpayment\s+confirmation\b",
                7,
            ),
            (r"\breceipt\b|\bpaid\b", 5),
            (
                r"\bthanks?\s+for\s+your\s+purchase\b|\bpurchase\s+confirmation\b",
                6,
            ),
        ],
    ),
    (
        "Bank Statements",
        &[
            (
                r"\baccount\s+statement\b|\bbank\s+statement\b|\bmonthly\s+statement\b",
                9,
            ),
            (
                r"\bbeginning\s+balance\b|\bending\s+balance\b|\btransaction\s+history\b",
                8,
            ),
            (
                r"\bstatement\s+period\b|\baccount\s+summary\b|\bdeposits?\sand\swithdrawals?\b",
                7,
            ),
            (r"\bdebit\b|\bcredit\b|\binterest\s+rate\b", 3),
            (r"\bstatement\b", 4),
        ],
    ),
    (
        "Payroll",
        &[
            (r"\bpay\s+stub\b|\bpayroll\b|\bearnings\s+statement\b", 9),
            (
                r"\bgross\s+pay\b|\bnet\s+pay\b|\byear\s+to\s+date\b|\bytd\b",
                8,
            ),
            (
                r"\bfederal\s+withholding\b|\bfica\b|\bmedicare\b|\bsocial\s+security\b",
                7,
            ),
            (r"\bsalary\b|\bwages?\b|\bhourly\s+rate\b|\bpay\s+period\b", 6),
        ],
    ),
    (
        "Expense Reports",
        &[
            (
                r"\bexpense\s+report\b|\breimbursement\s+request\b|\btravel\s+expense\b",
                9,
            ),
            (r"\bmileage\b|\bper\s+diem\b|\breceipts?\s+attached\b", 7),
            (r"\bexpenses?\b|\breimbursement\b", 5),
        ],
    ),
];
