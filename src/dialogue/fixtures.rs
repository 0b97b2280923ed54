//! Demo reference data: the consumer bill, its analysis, and the business
//! account (BAN) list.
//!
//! Everything here is static. Nothing mutates fixtures at runtime.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::chat::model::{BanAccount, BillBreakdownItem, BillSummaryData, ServiceItem};

/// Digits in a billing account number.
pub const BAN_DIGITS: usize = 12;

/// Foundation account grouping the demo BANs.
pub const FOUNDATION_ACCOUNT: &str = "59285142";

/// Numbers shown on the `bill-analysis` card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillAnalysis {
    pub current_total: Decimal,
    pub previous_total: Decimal,
    pub breakdown: Vec<BillBreakdownItem>,
    pub total_lines: u32,
    pub auto_pay_info: Option<String>,
    pub additional_info: Option<String>,
}

impl BillAnalysis {
    pub fn total_increase(&self) -> Decimal {
        self.current_total - self.previous_total
    }

    pub fn lines_with_increases(&self) -> u32 {
        self.breakdown
            .iter()
            .filter(|b| b.change_amount > Decimal::ZERO)
            .count() as u32
    }

    pub fn lines_unchanged(&self) -> u32 {
        self.total_lines.saturating_sub(self.lines_with_increases())
    }
}

/// One page of the BAN picker.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPage {
    pub accounts: Vec<BanAccount>,
    pub page: usize,
    /// Accounts matching the filter across all pages.
    pub total: usize,
    pub has_more: bool,
}

/// All demo data.
#[derive(Debug, Clone)]
pub struct Fixtures {
    consumer_bill: BillSummaryData,
    analysis: BillAnalysis,
    accounts: Vec<BanAccount>,
}

impl Fixtures {
    /// The demo data set.
    pub fn demo() -> Self {
        Self {
            consumer_bill: consumer_bill(),
            analysis: bill_analysis(),
            accounts: business_accounts(),
        }
    }

    /// Fixtures with a custom account list (tests).
    pub fn with_accounts(accounts: Vec<BanAccount>) -> Self {
        Self {
            accounts,
            ..Self::demo()
        }
    }

    pub fn consumer_bill(&self) -> &BillSummaryData {
        &self.consumer_bill
    }

    pub fn analysis(&self) -> &BillAnalysis {
        &self.analysis
    }

    pub fn accounts(&self) -> &[BanAccount] {
        &self.accounts
    }

    /// Look up an account by BAN.
    pub fn find_account(&self, ban: &str) -> Option<&BanAccount> {
        self.accounts.iter().find(|a| a.ban == ban)
    }

    /// Accounts sorted by descending balance, optionally without zero or
    /// negative balances.
    pub fn sorted_accounts(&self, filter_zero_balance: bool) -> Vec<BanAccount> {
        let mut accounts: Vec<BanAccount> = self
            .accounts
            .iter()
            .filter(|a| !filter_zero_balance || a.balance > Decimal::ZERO)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.ban.cmp(&b.ban)));
        accounts
    }

    /// One page of accounts. `page` is zero-based.
    pub fn paginated_accounts(
        &self,
        page: usize,
        page_size: usize,
        filter_zero_balance: bool,
    ) -> AccountPage {
        let sorted = self.sorted_accounts(filter_zero_balance);
        let total = sorted.len();
        let page_size = page_size.max(1);
        let accounts = sorted
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();
        AccountPage {
            accounts,
            page,
            total,
            has_more: (page + 1).saturating_mul(page_size) < total,
        }
    }

    /// Sum of every positive balance.
    pub fn total_positive_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .map(|a| a.balance)
            .filter(|b| *b > Decimal::ZERO)
            .sum()
    }

    /// Bill summary for a business account.
    pub fn business_bill(&self, account: &BanAccount) -> BillSummaryData {
        BillSummaryData {
            company_name: account.name.clone(),
            company_address: self.consumer_bill.company_address.clone(),
            page_info: None,
            issue_date: self.consumer_bill.issue_date.clone(),
            account_number: account.ban.clone(),
            foundation_account: Some(FOUNDATION_ACCOUNT.to_string()),
            invoice: format!("{}X10092023", account.ban),
            total_due: account.balance,
            due_date: self.consumer_bill.due_date.clone(),
            last_bill: account.balance,
            payment_amount: account.balance,
            payment_date: "Oct 1 - Thank you!".to_string(),
            remaining_balance: Decimal::ZERO,
            services: vec![ServiceItem {
                name: "Wireless".to_string(),
                amount: account.balance,
                page_ref: None,
            }],
            total_services: account.balance,
            billing_period: Some("Aug 16 - Sep 15, 2025".to_string()),
            adjustments: None,
        }
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::demo()
    }
}

/// Normalize typed BAN input: spaces and dashes are ignored, and what is
/// left must be exactly [`BAN_DIGITS`] digits.
pub fn normalize_ban(input: &str) -> Option<String> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if digits.len() == BAN_DIGITS && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

fn consumer_bill() -> BillSummaryData {
    BillSummaryData {
        company_name: "INSPECTOR DRAIN INC".to_string(),
        company_address: "5834 BETHELVIEW RD\nCUMMING, GA 30040-6312".to_string(),
        page_info: None,
        issue_date: "Sep 15, 2025".to_string(),
        account_number: "287301224446".to_string(),
        foundation_account: Some(FOUNDATION_ACCOUNT.to_string()),
        invoice: "287301224446X10092023".to_string(),
        total_due: dec!(6142.25),
        due_date: "Sep 15, 2025".to_string(),
        last_bill: dec!(9466.04),
        payment_amount: dec!(9466.04),
        payment_date: "Oct 1 - Thank you!".to_string(),
        remaining_balance: dec!(0.00),
        services: vec![ServiceItem {
            name: "Wireless".to_string(),
            amount: dec!(6142.25),
            page_ref: Some("Page 3".to_string()),
        }],
        total_services: dec!(6142.25),
        billing_period: Some("Aug 16 - Sep 15, 2025".to_string()),
        adjustments: None,
    }
}

fn bill_analysis() -> BillAnalysis {
    BillAnalysis {
        current_total: dec!(6142.25),
        previous_total: dec!(5890.10),
        breakdown: vec![
            BillBreakdownItem {
                line_number: "404-555-0142".to_string(),
                name: "Fleet Tablet 07".to_string(),
                change_text: "New line added mid-cycle".to_string(),
                change_amount: dec!(120.00),
                details: vec![
                    "Partial month of service: $40.00".to_string(),
                    "Activation fee: $80.00".to_string(),
                ],
            },
            BillBreakdownItem {
                line_number: "404-555-0118".to_string(),
                name: "Service Van 3".to_string(),
                change_text: "International roaming".to_string(),
                change_amount: dec!(87.15),
                details: vec!["Roaming in Mexico, Sep 2 - Sep 6".to_string()],
            },
            BillBreakdownItem {
                line_number: "404-555-0107".to_string(),
                name: "Office Main".to_string(),
                change_text: "Plan price change".to_string(),
                change_amount: dec!(45.00),
                details: vec!["Business Unlimited Performance: +$45.00/mo".to_string()],
            },
        ],
        total_lines: 24,
        auto_pay_info: Some("AutoPay is on. Your total will be charged on Sep 15, 2025.".to_string()),
        additional_info: Some(
            "Charges from a mid-cycle change appear as a partial month on this bill.".to_string(),
        ),
    }
}

fn business_accounts() -> Vec<BanAccount> {
    let rows: [(&str, &str, Decimal); 25] = [
        ("287301224446", "INSPECTOR DRAIN INC", dec!(6142.25)),
        ("287301224447", "INSPECTOR DRAIN - FLEET", dec!(2310.40)),
        ("287301224448", "INSPECTOR DRAIN - OFFICE", dec!(845.12)),
        ("287301224449", "INSPECTOR DRAIN - WAREHOUSE", dec!(0.00)),
        ("287301224450", "DRAIN PROS ATLANTA", dec!(1520.00)),
        ("287301224451", "DRAIN PROS MACON", dec!(310.75)),
        ("287301224452", "DRAIN PROS SAVANNAH", dec!(0.00)),
        ("287301224453", "CUMMING FIELD SERVICES", dec!(4120.88)),
        ("287301224454", "CUMMING FIELD - TABLETS", dec!(199.99)),
        ("287301224455", "NORTH GA PLUMBING", dec!(725.30)),
        ("287301224456", "NORTH GA PLUMBING - IOT", dec!(64.20)),
        ("287301224457", "ROOTER EXPRESS", dec!(0.00)),
        ("287301224458", "ROOTER EXPRESS - DISPATCH", dec!(1289.45)),
        ("287301224459", "LAKE LANIER SEWER CO", dec!(980.00)),
        ("287301224460", "LAKE LANIER - HOTSPOTS", dec!(42.10)),
        ("287301224461", "FORSYTH PIPE & SUPPLY", dec!(3305.67)),
        ("287301224462", "FORSYTH PIPE - SHOWROOM", dec!(0.00)),
        ("287301224463", "GWINNETT HYDRO JET", dec!(512.48)),
        ("287301224464", "GWINNETT HYDRO - CREW", dec!(1875.90)),
        ("287301224465", "BUFORD BACKFLOW", dec!(96.00)),
        ("287301224466", "ALPHARETTA LEAK DETECT", dec!(2650.33)),
        ("287301224467", "ALPHARETTA LEAK - VEHICLES", dec!(0.00)),
        ("287301224468", "DAWSONVILLE SEPTIC", dec!(433.21)),
        ("287301224469", "MILTON MAIN LINE", dec!(158.60)),
        ("287301224470", "JOHNS CREEK CAMERA INSPECT", dec!(701.05)),
    ];
    rows.into_iter()
        .map(|(ban, name, balance)| BanAccount {
            ban: ban.to_string(),
            name: name.to_string(),
            balance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_pages_never_include_zero_balances() {
        let fixtures = Fixtures::demo();
        let mut page = 0;
        loop {
            let result = fixtures.paginated_accounts(page, 10, true);
            assert!(result.accounts.iter().all(|a| a.balance > Decimal::ZERO));
            if !result.has_more {
                break;
            }
            page += 1;
        }
    }

    #[test]
    fn page_size_and_has_more() {
        let fixtures = Fixtures::demo();
        let filtered = fixtures.sorted_accounts(true).len();
        assert_eq!(filtered, 20);

        let first = fixtures.paginated_accounts(0, 10, true);
        assert_eq!(first.accounts.len(), 10);
        assert!(first.has_more);

        let second = fixtures.paginated_accounts(1, 10, true);
        assert_eq!(second.accounts.len(), 10);
        // (1 + 1) * 10 == 20, nothing left.
        assert!(!second.has_more);

        let unfiltered = fixtures.paginated_accounts(2, 10, false);
        assert_eq!(unfiltered.total, 25);
        assert_eq!(unfiltered.accounts.len(), 5);
        assert!(!unfiltered.has_more);
    }

    #[test]
    fn has_more_matches_formula_for_every_page() {
        let fixtures = Fixtures::demo();
        for size in 1..=12 {
            for page in 0..30 {
                let result = fixtures.paginated_accounts(page, size, true);
                assert_eq!(result.has_more, (page + 1) * size < result.total);
                assert!(result.accounts.len() <= size);
            }
        }
    }

    #[test]
    fn pages_sorted_by_descending_balance() {
        let fixtures = Fixtures::demo();
        let first = fixtures.paginated_accounts(0, 10, false);
        assert_eq!(first.accounts[0].ban, "287301224446");
        assert!(
            first
                .accounts
                .windows(2)
                .all(|w| w[0].balance >= w[1].balance)
        );
    }

    #[test]
    fn total_positive_balance_sums_filtered_accounts() {
        let fixtures = Fixtures::demo();
        let expected: Decimal = fixtures.sorted_accounts(true).iter().map(|a| a.balance).sum();
        assert_eq!(fixtures.total_positive_balance(), expected);

        let tiny = Fixtures::with_accounts(vec![
            BanAccount {
                ban: "1".into(),
                name: "a".into(),
                balance: dec!(10.50),
            },
            BanAccount {
                ban: "2".into(),
                name: "b".into(),
                balance: dec!(0),
            },
            BanAccount {
                ban: "3".into(),
                name: "c".into(),
                balance: dec!(4.25),
            },
        ]);
        assert_eq!(tiny.total_positive_balance(), dec!(14.75));
    }

    #[test]
    fn normalize_ban_ignores_separators() {
        assert_eq!(
            normalize_ban("2873-0122-4446").as_deref(),
            Some("287301224446")
        );
        assert_eq!(
            normalize_ban(" 2873 0122 4446 ").as_deref(),
            Some("287301224446")
        );
        assert_eq!(normalize_ban("28730122444"), None);
        assert_eq!(normalize_ban("2873012244467"), None);
        assert_eq!(normalize_ban("28730122444x"), None);
    }

    #[test]
    fn analysis_counts() {
        let analysis = Fixtures::demo().analysis().clone();
        assert_eq!(analysis.total_increase(), dec!(252.15));
        let breakdown_sum: Decimal = analysis.breakdown.iter().map(|b| b.change_amount).sum();
        assert_eq!(breakdown_sum, analysis.total_increase());
        assert_eq!(analysis.lines_with_increases(), 3);
        assert_eq!(analysis.lines_unchanged(), 21);
    }

    #[test]
    fn business_bill_uses_account_fields() {
        let fixtures = Fixtures::demo();
        let account = fixtures.find_account("287301224450").unwrap().clone();
        let bill = fixtures.business_bill(&account);
        assert_eq!(bill.company_name, "DRAIN PROS ATLANTA");
        assert_eq!(bill.total_due, dec!(1520.00));
        assert_eq!(bill.foundation_account.as_deref(), Some(FOUNDATION_ACCOUNT));
    }
}
