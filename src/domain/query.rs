use crate::domain::session::UserId;
use crate::domain::withdrawal::{WithdrawalRequest, WithdrawalStatus};
use serde::{Deserialize, Serialize};

/// Filter and page selection over withdrawal requests.
///
/// Pages are 1-indexed. `user_id` scopes the listing to one seller's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestQuery {
    pub status: Option<WithdrawalStatus>,
    pub user_id: Option<UserId>,
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

impl RequestQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            status: None,
            user_id: None,
            page: 1,
            page_size,
            search: None,
        }
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, request: &WithdrawalRequest) -> bool {
        self.status.is_none_or(|status| request.status == status)
            && self.user_id.is_none_or(|user| request.user_id == user)
            && self
                .needle()
                .is_none_or(|needle| request.matches_search(&needle))
    }

    /// Filters, orders newest first and cuts out the requested page.
    pub fn paginate<I>(&self, requests: I) -> RequestPage
    where
        I: IntoIterator<Item = WithdrawalRequest>,
    {
        let mut matching: Vec<WithdrawalRequest> =
            requests.into_iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then(b.withdraw_id.cmp(&a.withdraw_id))
        });

        let total_requests = matching.len() as u64;
        let page_size = u64::from(self.page_size.max(1));
        let total_pages = total_requests.div_ceil(page_size);
        let skip = u64::from(self.page.saturating_sub(1)) * page_size;

        let requests = matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect();

        RequestPage {
            requests,
            current_page: self.page,
            total_pages,
            total_requests,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPage {
    pub requests: Vec<WithdrawalRequest>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_requests: u64,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::fee::FeeQuote;
    use crate::domain::session::Session;
    use crate::domain::wallet::{PhoneNumber, Wallet, WalletId, WalletName};
    use crate::domain::withdrawal::{Settlement, WithdrawalId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn request(id: u64, user: u64, phone: &str) -> WithdrawalRequest {
        let session = Session::seller(UserId(user), "seller", phone, base() + Duration::days(1));
        let wallet = Wallet {
            wallet_id: WalletId(user),
            user_id: UserId(user),
            wallet_name: WalletName::BKash,
            wallet_phone_no: PhoneNumber::parse("01999999999").unwrap(),
            created_at: base(),
        };
        WithdrawalRequest::pending(
            WithdrawalId(id),
            &session,
            &wallet,
            Amount::new(dec!(100)).unwrap(),
            FeeQuote {
                transaction_fee: dec!(5),
                actual_amount: dec!(95),
            },
            base() + Duration::minutes(id as i64),
            None,
        )
    }

    fn sample() -> Vec<WithdrawalRequest> {
        (1..=12)
            .map(|id| request(id, id % 3, &format!("0171000000{}", id % 10)))
            .collect()
    }

    #[test]
    fn test_pagination_is_one_indexed_newest_first() {
        let mut query = RequestQuery::new(5);
        let page = query.paginate(sample());
        assert_eq!(page.total_requests, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 1);
        let ids: Vec<u64> = page.requests.iter().map(|r| r.withdraw_id.0).collect();
        assert_eq!(ids, vec![12, 11, 10, 9, 8]);

        query.page = 3;
        let page = query.paginate(sample());
        let ids: Vec<u64> = page.requests.iter().map(|r| r.withdraw_id.0).collect();
        assert_eq!(ids, vec![2, 1]);

        query.page = 4;
        assert!(query.paginate(sample()).requests.is_empty());
    }

    #[test]
    fn test_empty_result_has_no_pages() {
        let page = RequestQuery::new(10).paginate(Vec::new());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.total_requests, 0);
    }

    #[test]
    fn test_status_and_user_filters() {
        let mut requests = sample();
        requests[0]
            .settle(&Settlement::reject("duplicate").unwrap(), base())
            .unwrap();

        let mut query = RequestQuery::new(50);
        query.status = Some(WithdrawalStatus::Rejected);
        assert_eq!(query.paginate(requests.clone()).total_requests, 1);

        let mut query = RequestQuery::new(50);
        query.user_id = Some(UserId(0));
        let page = query.paginate(requests);
        assert_eq!(page.total_requests, 4);
        assert!(page.requests.iter().all(|r| r.user_id == UserId(0)));
    }

    #[test]
    fn test_search_is_case_insensitive_and_trimmed() {
        let mut requests = sample();
        requests[4]
            .settle(
                &Settlement::approve("BKX77QZ", "01900000000", None).unwrap(),
                base(),
            )
            .unwrap();

        let mut query = RequestQuery::new(50);
        query.search = Some("  bkx77 ".to_string());
        let page = query.paginate(requests.clone());
        assert_eq!(page.total_requests, 1);
        assert_eq!(page.requests[0].withdraw_id, WithdrawalId(5));

        query.search = Some("01710000003".to_string());
        assert_eq!(query.paginate(requests.clone()).total_requests, 1);

        query.search = Some("   ".to_string());
        assert_eq!(query.paginate(requests).total_requests, 12);
    }
}
