//! Admin dashboard reports.
//!
//! Everything here is a pure function of `today` and the rows read from the
//! store, so reports can be tested without a database or a clock.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use ecom24_core::{Gender, Order, OrderId, OrderStatus, Product, User};

/// Months shown in the short charts.
pub const SHORT_WINDOW: usize = 6;
/// Months shown in the long charts.
pub const LONG_WINDOW: usize = 12;
/// Number of orders listed as latest transactions.
pub const LATEST_TRANSACTIONS: usize = 5;

/// Percent change from `last_month` to `this_month`.
///
/// When there was nothing last month the result is `this_month * 100`.
///
/// ```
/// use rust_decimal::Decimal;
/// use ecom24_api::services::stats::calculate_percentage;
///
/// assert_eq!(calculate_percentage(Decimal::from(3), Decimal::from(2)), Decimal::from(150));
/// assert_eq!(calculate_percentage(Decimal::from(4), Decimal::ZERO), Decimal::from(400));
/// ```
#[must_use]
pub fn calculate_percentage(this_month: Decimal, last_month: Decimal) -> Decimal {
    if last_month.is_zero() {
        return this_month.saturating_mul(Decimal::ONE_HUNDRED);
    }
    this_month
        .checked_div(last_month)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn month_number(date: DateTime<Utc>) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Bucket for `created_at` in a `length`-month window ending this month.
///
/// The current month is the last bucket. Items from the future or older
/// than the window have no bucket.
#[must_use]
pub fn month_index(
    today: DateTime<Utc>,
    created_at: DateTime<Utc>,
    length: usize,
) -> Option<usize> {
    let diff = usize::try_from(month_number(today) - month_number(created_at)).ok()?;
    (diff < length).then(|| length - diff - 1)
}

/// Count items per month over a `length`-month window.
pub fn month_counts<T>(
    today: DateTime<Utc>,
    items: &[T],
    created_at: impl Fn(&T) -> DateTime<Utc>,
    length: usize,
) -> Vec<u64> {
    let mut data = vec![0_u64; length];
    for item in items {
        let bucket = month_index(today, created_at(item), length);
        if let Some(slot) = bucket.and_then(|i| data.get_mut(i)) {
            *slot += 1;
        }
    }
    data
}

/// Sum `value` per month over a `length`-month window.
pub fn month_sums<T>(
    today: DateTime<Utc>,
    items: &[T],
    created_at: impl Fn(&T) -> DateTime<Utc>,
    value: impl Fn(&T) -> Decimal,
    length: usize,
) -> Vec<Decimal> {
    let mut data = vec![Decimal::ZERO; length];
    for item in items {
        let bucket = month_index(today, created_at(item), length);
        if let Some(slot) = bucket.and_then(|i| data.get_mut(i)) {
            *slot += value(item);
        }
    }
    data
}

/// Whole-percent share of products in each category.
#[must_use]
pub fn category_shares(categories: &[String], products: &[Product]) -> BTreeMap<String, u64> {
    let total = products.len() as u64;
    categories
        .iter()
        .map(|category| {
            let count = products.iter().filter(|p| &p.category == category).count() as u64;
            (category.clone(), whole_percent(count, total))
        })
        .collect()
}

/// `part / total` as a whole percent, rounding halves up; 0 when `total` is 0.
fn whole_percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part * 200 + total) / (total * 2)
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

/// Start of the previous calendar month and of the current one.
fn month_ranges(today: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let this_start = month_start(today.year(), today.month()).unwrap_or(today);
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let last_start = month_start(year, month).unwrap_or(this_start);
    (last_start, this_start)
}

fn sum_totals<'a>(orders: impl Iterator<Item = &'a Order>) -> Decimal {
    orders.map(|o| o.total).sum()
}

fn count_in(
    dates: impl Iterator<Item = DateTime<Utc>>,
    in_range: impl Fn(DateTime<Utc>) -> bool,
) -> Decimal {
    Decimal::from(dates.filter(|at| in_range(*at)).count() as u64)
}

/// Categories present in `products`, sorted.
fn distinct_categories(products: &[Product]) -> Vec<String> {
    let mut categories: Vec<String> = products.iter().map(|p| p.category.clone()).collect();
    categories.sort();
    categories.dedup();
    categories
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePercent {
    pub revenue: Decimal,
    pub product: Decimal,
    pub user: Decimal,
    pub order: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub revenue: Decimal,
    pub users: u64,
    pub products: u64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyOrders {
    pub order: Vec<u64>,
    pub revenue: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRatio {
    pub male: u64,
    pub female: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderRatioPercent {
    pub female_users: u64,
    pub male_users: u64,
}

/// Summary row for a recent order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: OrderId,
    pub name: String,
    pub quantity: u32,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
}

/// Headline numbers for the dashboard landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub category_count: BTreeMap<String, u64>,
    pub change_percent: ChangePercent,
    pub count: Counts,
    pub chart: MonthlyOrders,
    pub user_ratio: UserRatio,
    pub gender_ratio_percent: GenderRatioPercent,
    pub latest_transactions: Vec<Transaction>,
}

/// Build the dashboard summary.
#[must_use]
pub fn dashboard_stats(
    today: DateTime<Utc>,
    products: &[Product],
    users: &[User],
    orders: &[Order],
) -> DashboardStats {
    let (last_start, this_start) = month_ranges(today);
    let this_month = |at: DateTime<Utc>| at >= this_start && at <= today;
    let last_month = |at: DateTime<Utc>| at >= last_start && at < this_start;

    let change_percent = ChangePercent {
        revenue: calculate_percentage(
            sum_totals(orders.iter().filter(|o| this_month(o.created_at))),
            sum_totals(orders.iter().filter(|o| last_month(o.created_at))),
        ),
        product: calculate_percentage(
            count_in(products.iter().map(|p| p.created_at), this_month),
            count_in(products.iter().map(|p| p.created_at), last_month),
        ),
        user: calculate_percentage(
            count_in(users.iter().map(|u| u.created_at), this_month),
            count_in(users.iter().map(|u| u.created_at), last_month),
        ),
        order: calculate_percentage(
            count_in(orders.iter().map(|o| o.created_at), this_month),
            count_in(orders.iter().map(|o| o.created_at), last_month),
        ),
    };

    let female = users.iter().filter(|u| u.gender == Gender::Female).count() as u64;
    let user_count = users.len() as u64;
    let female_percent = whole_percent(female, user_count);
    let gender_ratio_percent = if user_count == 0 {
        GenderRatioPercent {
            female_users: 0,
            male_users: 0,
        }
    } else {
        GenderRatioPercent {
            female_users: female_percent,
            male_users: 100 - female_percent,
        }
    };

    let mut newest: Vec<&Order> = orders.iter().collect();
    newest.sort_by_key(|o| std::cmp::Reverse(o.created_at));
    let latest_transactions = newest
        .into_iter()
        .take(LATEST_TRANSACTIONS)
        .map(|order| {
            let first = order.order_items.first();
            Transaction {
                id: order.id,
                name: first.map(|i| i.name.clone()).unwrap_or_default(),
                quantity: first.map_or(0, |i| i.quantity),
                discount: order.discount,
                total: order.total,
                status: order.status,
            }
        })
        .collect();

    DashboardStats {
        category_count: category_shares(&distinct_categories(products), products),
        change_percent,
        count: Counts {
            revenue: sum_totals(orders.iter()),
            users: user_count,
            products: products.len() as u64,
            orders: orders.len() as u64,
        },
        chart: MonthlyOrders {
            order: month_counts(today, orders, |o| o.created_at, SHORT_WINDOW),
            revenue: month_sums(today, orders, |o| o.created_at, |o| o.total, SHORT_WINDOW),
        },
        user_ratio: UserRatio {
            male: user_count - female,
            female,
        },
        gender_ratio_percent,
        latest_transactions,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFulfillment {
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAvailability {
    pub in_stock: u64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDistribution {
    pub gross_income: Decimal,
    /// Shipping charges.
    pub production_cost: Decimal,
    pub discount: Decimal,
    /// Tax.
    pub burnt: Decimal,
    pub marketing_cost: Decimal,
    pub net_margin: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeGroups {
    pub teen: u64,
    pub adult: u64,
    pub senior: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCustomer {
    pub admin: u64,
    pub customer: u64,
}

/// Data for the dashboard pie charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieCharts {
    pub order_fulfillment: OrderFulfillment,
    pub product_categories: BTreeMap<String, u64>,
    pub stock_availability: StockAvailability,
    pub revenue_distribution: RevenueDistribution,
    pub users_age_group: AgeGroups,
    pub admin_customer: AdminCustomer,
}

/// Build the pie chart data.
#[must_use]
pub fn pie_charts(
    today: DateTime<Utc>,
    products: &[Product],
    users: &[User],
    orders: &[Order],
) -> PieCharts {
    let with_status =
        |status: OrderStatus| orders.iter().filter(|o| o.status == status).count() as u64;
    let out_of_stock = products.iter().filter(|p| !p.is_in_stock()).count() as u64;

    let gross_income = sum_totals(orders.iter());
    let discount: Decimal = orders.iter().map(|o| o.discount).sum();
    let production_cost: Decimal = orders.iter().map(|o| o.shipping_charges).sum();
    let burnt: Decimal = orders.iter().map(|o| o.tax).sum();
    let marketing_cost = (gross_income * Decimal::new(3, 1))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let today = today.date_naive();
    let ages: Vec<u32> = users.iter().map(|u| u.age_on(today)).collect();
    let admins = users.iter().filter(|u| u.is_admin()).count() as u64;

    PieCharts {
        order_fulfillment: OrderFulfillment {
            processing: with_status(OrderStatus::Processing),
            shipped: with_status(OrderStatus::Shipped),
            delivered: with_status(OrderStatus::Delivered),
        },
        product_categories: category_shares(&distinct_categories(products), products),
        stock_availability: StockAvailability {
            in_stock: products.len() as u64 - out_of_stock,
            out_of_stock,
        },
        revenue_distribution: RevenueDistribution {
            gross_income,
            production_cost,
            discount,
            burnt,
            marketing_cost,
            net_margin: gross_income - production_cost - discount - burnt - marketing_cost,
        },
        users_age_group: AgeGroups {
            teen: ages.iter().filter(|age| **age < 20).count() as u64,
            adult: ages.iter().filter(|age| (20..=60).contains(*age)).count() as u64,
            senior: ages.iter().filter(|age| **age >= 61).count() as u64,
        },
        admin_customer: AdminCustomer {
            admin: admins,
            customer: users.len() as u64 - admins,
        },
    }
}

/// Monthly counts for the dashboard bar charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarCharts {
    pub users: Vec<u64>,
    pub products: Vec<u64>,
    pub orders: Vec<u64>,
}

/// Products and users over six months, orders over twelve.
#[must_use]
pub fn bar_charts(
    today: DateTime<Utc>,
    products: &[Product],
    users: &[User],
    orders: &[Order],
) -> BarCharts {
    BarCharts {
        users: month_counts(today, users, |u| u.created_at, SHORT_WINDOW),
        products: month_counts(today, products, |p| p.created_at, SHORT_WINDOW),
        orders: month_counts(today, orders, |o| o.created_at, LONG_WINDOW),
    }
}

/// Twelve-month series for the dashboard line charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCharts {
    pub users: Vec<u64>,
    pub products: Vec<u64>,
    pub discount: Vec<Decimal>,
    pub revenue: Vec<Decimal>,
}

#[must_use]
pub fn line_charts(
    today: DateTime<Utc>,
    products: &[Product],
    users: &[User],
    orders: &[Order],
) -> LineCharts {
    LineCharts {
        users: month_counts(today, users, |u| u.created_at, LONG_WINDOW),
        products: month_counts(today, products, |p| p.created_at, LONG_WINDOW),
        discount: month_sums(today, orders, |o| o.created_at, |o| o.discount, LONG_WINDOW),
        revenue: month_sums(today, orders, |o| o.created_at, |o| o.total, LONG_WINDOW),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use ecom24_core::{Email, OrderItem, ProductId, Role, ShippingInfo, UserId};

    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn order(created_at: DateTime<Utc>, total: i64, status: OrderStatus) -> Order {
        Order {
            id: OrderId::generate(),
            shipping_info: ShippingInfo {
                name: "Asha".to_owned(),
                address: "12 MG Road".to_owned(),
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                country: "India".to_owned(),
                pin_code: 411_001,
            },
            user: UserId::parse("u1").unwrap(),
            order_items: vec![OrderItem {
                product_id: ProductId::generate(),
                name: "Lamp".to_owned(),
                photo: String::new(),
                price: Decimal::from(total),
                quantity: 2,
            }],
            subtotal: Decimal::from(total),
            tax: Decimal::from(10),
            shipping_charges: Decimal::from(20),
            discount: Decimal::from(5),
            total: Decimal::from(total),
            status,
            created_at,
            updated_at: created_at,
        }
    }

    fn product(category: &str, stock: i32, created_at: DateTime<Utc>) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Thing".to_owned(),
            photos: vec![],
            price: Decimal::from(100),
            stock,
            category: category.to_owned(),
            description: String::new(),
            created_at,
            updated_at: created_at,
        }
    }

    fn user(id: &str, gender: Gender, dob: NaiveDate, role: Role) -> User {
        User {
            id: UserId::parse(id).unwrap(),
            name: id.to_owned(),
            email: Email::parse(&format!("{id}@example.in")).unwrap(),
            photo: String::new(),
            role,
            gender,
            dob,
            created_at: at(2024, 6, 1),
            updated_at: at(2024, 6, 1),
        }
    }

    #[test]
    fn test_calculate_percentage() {
        let d = Decimal::from;
        assert_eq!(calculate_percentage(d(0), d(0)), d(0));
        assert_eq!(calculate_percentage(d(7), d(0)), d(700));
        assert_eq!(calculate_percentage(d(1), d(3)), d(33));
        assert_eq!(calculate_percentage(d(1), d(8)), d(13));
        assert_eq!(calculate_percentage(d(0), d(5)), d(0));
    }

    #[test]
    fn test_month_index_current_month_is_last_bucket() {
        let today = at(2025, 3, 15);
        assert_eq!(month_index(today, at(2025, 3, 1), 6), Some(5));
        assert_eq!(month_index(today, at(2024, 10, 31), 6), Some(0));
        assert_eq!(month_index(today, at(2024, 9, 30), 6), None);
    }

    #[test]
    fn test_month_index_is_year_aware() {
        let today = at(2025, 1, 10);
        assert_eq!(month_index(today, at(2024, 12, 31), 6), Some(4));
        // Same calendar month one year earlier is outside a 12-month window.
        assert_eq!(month_index(today, at(2024, 1, 10), 12), None);
        assert_eq!(month_index(today, at(2025, 2, 1), 6), None);
    }

    #[test]
    fn test_month_counts_sum_to_in_window_items() {
        let today = at(2025, 3, 15);
        let orders = vec![
            order(at(2025, 3, 2), 100, OrderStatus::Processing),
            order(at(2025, 3, 9), 50, OrderStatus::Processing),
            order(at(2025, 1, 20), 25, OrderStatus::Shipped),
            order(at(2024, 11, 1), 10, OrderStatus::Delivered),
        ];

        let counts = month_counts(today, &orders, |o| o.created_at, 6);
        let sums = month_sums(today, &orders, |o| o.created_at, |o| o.total, 6);

        assert_eq!(counts, vec![0, 1, 0, 1, 0, 2]);
        assert_eq!(counts.iter().sum::<u64>(), 4);
        assert_eq!(sums[5], Decimal::from(150));
        assert_eq!(sums[3], Decimal::from(25));
    }

    #[test]
    fn test_category_shares() {
        let now = at(2025, 3, 1);
        let products = vec![
            product("laptop", 1, now),
            product("laptop", 1, now),
            product("camera", 1, now),
        ];
        let shares = category_shares(&distinct_categories(&products), &products);

        assert_eq!(shares.get("laptop"), Some(&67));
        assert_eq!(shares.get("camera"), Some(&33));
        assert!(category_shares(&["laptop".to_owned()], &[]).values().all(|v| *v == 0));
    }

    #[test]
    fn test_dashboard_change_percent_uses_calendar_months() {
        let today = at(2025, 3, 15);
        let orders = vec![
            order(at(2025, 3, 2), 300, OrderStatus::Processing),
            order(at(2025, 2, 28), 200, OrderStatus::Processing),
            order(at(2025, 1, 31), 999, OrderStatus::Processing),
        ];

        let stats = dashboard_stats(today, &[], &[], &orders);

        assert_eq!(stats.change_percent.revenue, Decimal::from(150));
        assert_eq!(stats.change_percent.order, Decimal::from(100));
        assert_eq!(stats.count.revenue, Decimal::from(1499));
        assert_eq!(stats.count.orders, 3);
        assert_eq!(stats.latest_transactions[0].name, "Lamp");
        assert_eq!(stats.latest_transactions[0].total, Decimal::from(300));
    }

    #[test]
    fn test_gender_ratio_with_no_users() {
        let stats = dashboard_stats(at(2025, 3, 15), &[], &[], &[]);
        assert_eq!(
            stats.gender_ratio_percent,
            GenderRatioPercent {
                female_users: 0,
                male_users: 0
            }
        );
        assert!(stats.latest_transactions.is_empty());
    }

    #[test]
    fn test_gender_ratio_rounds() {
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let users = vec![
            user("a", Gender::Female, dob, Role::User),
            user("b", Gender::Male, dob, Role::User),
            user("c", Gender::Male, dob, Role::User),
        ];
        let stats = dashboard_stats(at(2025, 3, 15), &[], &users, &[]);

        assert_eq!(stats.user_ratio, UserRatio { male: 2, female: 1 });
        assert_eq!(stats.gender_ratio_percent.female_users, 33);
        assert_eq!(stats.gender_ratio_percent.male_users, 67);
    }

    #[test]
    fn test_pie_revenue_distribution() {
        let orders = vec![
            order(at(2025, 3, 2), 1000, OrderStatus::Processing),
            order(at(2025, 3, 3), 15, OrderStatus::Delivered),
        ];
        let charts = pie_charts(at(2025, 3, 15), &[], &[], &orders);
        let revenue = &charts.revenue_distribution;

        assert_eq!(revenue.gross_income, Decimal::from(1015));
        assert_eq!(revenue.marketing_cost, Decimal::from(305));
        assert_eq!(revenue.production_cost, Decimal::from(40));
        assert_eq!(revenue.burnt, Decimal::from(20));
        assert_eq!(revenue.discount, Decimal::from(10));
        assert_eq!(revenue.net_margin, Decimal::from(1015 - 40 - 10 - 20 - 305));
        assert_eq!(charts.order_fulfillment.processing, 1);
        assert_eq!(charts.order_fulfillment.delivered, 1);
    }

    #[test]
    fn test_pie_age_groups_and_stock() {
        let today = at(2025, 3, 15);
        let users = vec![
            user("teen", Gender::Female, NaiveDate::from_ymd_opt(2008, 1, 1).unwrap(), Role::User),
            user("adult", Gender::Male, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), Role::Admin),
            user("senior", Gender::Male, NaiveDate::from_ymd_opt(1950, 1, 1).unwrap(), Role::User),
        ];
        let products = vec![product("a", 0, today), product("a", 3, today)];

        let charts = pie_charts(today, &products, &users, &[]);

        assert_eq!(
            charts.users_age_group,
            AgeGroups {
                teen: 1,
                adult: 1,
                senior: 1
            }
        );
        assert_eq!(charts.admin_customer, AdminCustomer { admin: 1, customer: 2 });
        assert_eq!(charts.stock_availability.out_of_stock, 1);
        assert_eq!(charts.stock_availability.in_stock, 1);
    }

    #[test]
    fn test_bar_and_line_window_lengths() {
        let today = at(2025, 3, 15);
        let bar = bar_charts(today, &[], &[], &[]);
        let line = line_charts(today, &[], &[], &[]);

        assert_eq!(bar.users.len(), SHORT_WINDOW);
        assert_eq!(bar.orders.len(), LONG_WINDOW);
        assert_eq!(line.revenue.len(), LONG_WINDOW);
    }
}
