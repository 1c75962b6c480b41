use crate::report::{Alert, AlertLevel, AnalysisReport, Opportunity, Priority};
use crate::stats::{mean_and_std_dev, quantile, round_to};
use chrono::NaiveDate;
use configuration::AnalysisThresholds;
use core_types::dates::{is_weekend, month_key};
use core_types::Reading;
use std::collections::BTreeMap;

const NIGHT_LAST_HOUR: u32 = 7;
const DAYTIME_LAST_HOUR: u32 = 17;

/// A stateless calculator for deriving a consumption profile from meter readings.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    thresholds: AnalysisThresholds,
}

/// Running sums collected in a single pass over the readings.
struct Accumulator {
    count: usize,
    total: f64,
    max: f64,
    hourly_totals: [f64; 24],
    hourly_counts: [usize; 24],
    daily_totals: BTreeMap<NaiveDate, f64>,
    monthly_totals: BTreeMap<String, f64>,
    values: Vec<f64>,
    weekend: f64,
    night: f64,
    daytime: f64,
    evening: f64,
}

/// Unrounded figures the rules are evaluated against.
struct Metrics {
    total_consumption: f64,
    average_daily: f64,
    average_hourly: f64,
    max_consumption: f64,
    base_load: f64,
    active_days: usize,
    peak_hour: u32,
    peak_hour_average: f64,
    load_factor: f64,
    weekend_share: f64,
    night_share: f64,
    daytime_share: f64,
    evening_share: f64,
    monthly_trend_pct: Option<f64>,
    anomalies_count: usize,
}

impl AnalyticsEngine {
    pub fn new(thresholds: AnalysisThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AnalysisThresholds {
        &self.thresholds
    }

    /// The main entry point: profiles a set of readings.
    ///
    /// Readings may be in any order and may span several metering points; the
    /// result depends only on the multiset of readings.
    pub fn analyze(&self, readings: &[Reading]) -> AnalysisReport {
        if readings.is_empty() {
            return AnalysisReport::insufficient_data();
        }

        let acc = Self::accumulate(readings);
        let metrics = self.derive_metrics(&acc);

        let alerts = self.evaluate_alerts(&metrics);
        let opportunities = self.evaluate_opportunities(&metrics);
        let recommendation = self.recommend(&metrics, &alerts);

        tracing::debug!(
            readings = readings.len(),
            active_days = metrics.active_days,
            alerts = alerts.len(),
            "consumption analysis complete"
        );

        AnalysisReport {
            total_consumption: round_to(metrics.total_consumption, 2),
            average_daily: round_to(metrics.average_daily, 2),
            average_hourly: round_to(metrics.average_hourly, 3),
            max_consumption: round_to(metrics.max_consumption, 3),
            base_load: round_to(metrics.base_load, 3),
            active_days: metrics.active_days,
            peak_hour: metrics.peak_hour,
            peak_hour_average: round_to(metrics.peak_hour_average, 3),
            load_factor: round_to(metrics.load_factor, 3),
            weekend_share: round_to(metrics.weekend_share, 1),
            night_share: round_to(metrics.night_share, 1),
            daytime_share: round_to(metrics.daytime_share, 1),
            evening_share: round_to(metrics.evening_share, 1),
            monthly_trend_pct: metrics.monthly_trend_pct.map(|t| round_to(t, 1)),
            anomalies_count: metrics.anomalies_count,
            recommendation,
            alerts,
            opportunities,
        }
    }

    fn accumulate(readings: &[Reading]) -> Accumulator {
        let mut acc = Accumulator {
            count: readings.len(),
            total: 0.0,
            max: 0.0,
            hourly_totals: [0.0; 24],
            hourly_counts: [0; 24],
            daily_totals: BTreeMap::new(),
            monthly_totals: BTreeMap::new(),
            values: Vec::with_capacity(readings.len()),
            weekend: 0.0,
            night: 0.0,
            daytime: 0.0,
            evening: 0.0,
        };

        for reading in readings {
            // Consumption is non-negative by contract; anything else carries no energy.
            let kwh = if reading.consumption_kwh.is_finite() && reading.consumption_kwh > 0.0 {
                reading.consumption_kwh
            } else {
                0.0
            };
            let hour = reading.hour() as usize;

            acc.total += kwh;
            acc.max = acc.max.max(kwh);
            acc.hourly_totals[hour] += kwh;
            acc.hourly_counts[hour] += 1;
            acc.values.push(kwh);
            *acc.daily_totals.entry(reading.date).or_insert(0.0) += kwh;
            *acc.monthly_totals.entry(month_key(reading.date)).or_insert(0.0) += kwh;

            // The weekend bucket is independent of the time-of-day bands.
            if is_weekend(reading.date) {
                acc.weekend += kwh;
            }
            match hour as u32 {
                h if h <= NIGHT_LAST_HOUR => acc.night += kwh,
                h if h <= DAYTIME_LAST_HOUR => acc.daytime += kwh,
                _ => acc.evening += kwh,
            }
        }

        acc
    }

    fn derive_metrics(&self, acc: &Accumulator) -> Metrics {
        let active_days = acc.daily_totals.len();
        let average_daily = if active_days > 0 { acc.total / active_days as f64 } else { 0.0 };
        let average_hourly = if acc.count > 0 { acc.total / acc.count as f64 } else { 0.0 };

        // Strict comparison keeps the lowest hour on ties.
        let mut peak_hour = 0;
        let mut peak_hour_average = 0.0;
        for hour in 0..24 {
            let average = if acc.hourly_counts[hour] > 0 {
                acc.hourly_totals[hour] / acc.hourly_counts[hour] as f64
            } else {
                0.0
            };
            if average > peak_hour_average {
                peak_hour_average = average;
                peak_hour = hour as u32;
            }
        }

        let load_factor = if acc.max > 0.0 { average_hourly / acc.max } else { 0.0 };
        let share = |bucket: f64| if acc.total > 0.0 { bucket / acc.total * 100.0 } else { 0.0 };

        Metrics {
            total_consumption: acc.total,
            average_daily,
            average_hourly,
            max_consumption: acc.max,
            base_load: quantile(&acc.values, self.thresholds.base_load_quantile),
            active_days,
            peak_hour,
            peak_hour_average,
            load_factor,
            weekend_share: share(acc.weekend),
            night_share: share(acc.night),
            daytime_share: share(acc.daytime),
            evening_share: share(acc.evening),
            monthly_trend_pct: Self::monthly_trend(&acc.monthly_totals),
            anomalies_count: self.count_anomalous_days(&acc.daily_totals),
        }
    }

    /// Change of the latest month against the one before it, in percent.
    fn monthly_trend(monthly_totals: &BTreeMap<String, f64>) -> Option<f64> {
        let mut months = monthly_totals.values().rev();
        let current = *months.next()?;
        let previous = *months.next()?;

        if previous > 0.0 {
            Some((current - previous) / previous * 100.0)
        } else {
            None
        }
    }

    fn count_anomalous_days(&self, daily_totals: &BTreeMap<NaiveDate, f64>) -> usize {
        let days: Vec<f64> = daily_totals.values().copied().collect();
        let (mean, std_dev) = mean_and_std_dev(&days);
        let threshold = mean + self.thresholds.anomaly_sigma * std_dev;

        days.iter().filter(|&&total| total > threshold).count()
    }

    /// Every applicable rule fires; a low-severity "stable" alert is the fallback.
    fn evaluate_alerts(&self, m: &Metrics) -> Vec<Alert> {
        let t = &self.thresholds;
        let mut alerts = Vec::new();

        if m.load_factor < t.irregular_load_factor {
            alerts.push(Alert {
                level: AlertLevel::High,
                title: "Highly irregular load curve".to_string(),
                detail: "Peaks are high compared with average consumption. Shifting part of the demand is advisable.".to_string(),
            });
        }
        if m.night_share > t.night_share_alert_pct {
            alerts.push(Alert {
                level: AlertLevel::Medium,
                title: "High night-time consumption".to_string(),
                detail: format!(
                    "More than {}% of consumption happens between 00:00 and 07:59.",
                    t.night_share_alert_pct
                ),
            });
        }
        if let Some(trend) = m.monthly_trend_pct.filter(|&trend| trend > t.monthly_growth_alert_pct) {
            alerts.push(Alert {
                level: AlertLevel::High,
                title: "Rising monthly trend".to_string(),
                detail: format!("The last month is up {trend:.1}% on the previous one."),
            });
        }
        if m.anomalies_count > 0 {
            alerts.push(Alert {
                level: AlertLevel::Medium,
                title: "Anomalous days detected".to_string(),
                detail: format!(
                    "{} days with consumption clearly outside the usual pattern.",
                    m.anomalies_count
                ),
            });
        }

        if alerts.is_empty() {
            alerts.push(Alert {
                level: AlertLevel::Low,
                title: "Stable profile".to_string(),
                detail: "No critical deviations were detected in the analysed period.".to_string(),
            });
        }

        alerts
    }

    fn evaluate_opportunities(&self, m: &Metrics) -> Vec<Opportunity> {
        let t = &self.thresholds;
        let mut opportunities = Vec::new();

        if m.night_share > t.night_share_opportunity_pct {
            opportunities.push(Opportunity {
                priority: Priority::High,
                title: "Optimize night-time load".to_string(),
                detail: "Review night base loads and automate shutdowns outside operating hours.".to_string(),
                estimated_savings_pct: 8,
            });
        }
        if m.load_factor < t.flatten_peaks_load_factor {
            opportunities.push(Opportunity {
                priority: Priority::Medium,
                title: "Flatten demand peaks".to_string(),
                detail: "Stagger energy-intensive equipment to lower point maxima.".to_string(),
                estimated_savings_pct: 6,
            });
        }
        if m.monthly_trend_pct.is_some_and(|trend| trend > 0.0) {
            opportunities.push(Opportunity {
                priority: Priority::Medium,
                title: "Correct the growth trend".to_string(),
                detail: "Control equipment start-ups and follow deviations up weekly.".to_string(),
                estimated_savings_pct: 5,
            });
        }

        if opportunities.is_empty() {
            opportunities.push(Opportunity {
                priority: Priority::Low,
                title: "Maintain operational control".to_string(),
                detail: "Keep the weekly follow-up to sustain stable consumption.".to_string(),
                estimated_savings_pct: 3,
            });
        }

        opportunities
    }

    /// First matching message wins.
    fn recommend(&self, m: &Metrics, alerts: &[Alert]) -> String {
        let t = &self.thresholds;

        let message = if alerts.iter().any(|a| a.level == AlertLevel::High) {
            "Prioritise reducing peaks and reviewing night-time consumption to cut costs."
        } else if m.night_share > t.night_share_opportunity_pct {
            "There is clear room for savings at night: review base loads and phantom consumption."
        } else if (t.evening_peak_start_hour..=t.evening_peak_end_hour).contains(&m.peak_hour) {
            "The peak falls in the evening band; shifting loads can lower the energy cost."
        } else {
            "The profile is stable. Keep monitoring weekly and review occasional deviations."
        };

        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPS: f64 = 1e-9;

    fn reading(date: &str, time: &str, kwh: f64) -> Reading {
        Reading {
            metering_point_id: "ES0021000000000001XY".to_string(),
            date: date.parse().unwrap(),
            time: time.to_string(),
            consumption_kwh: kwh,
            obtain_method: "Real".to_string(),
        }
    }

    /// 24 hourly readings on one weekday, 1 kWh each except hour 20 at 5 kWh.
    fn evening_spike_day() -> Vec<Reading> {
        (0..24)
            .map(|h| reading("2024-03-05", &format!("{h:02}:00"), if h == 20 { 5.0 } else { 1.0 }))
            .collect()
    }

    #[test]
    fn empty_input_yields_insufficient_data_report() {
        let report = AnalyticsEngine::default().analyze(&[]);

        assert_eq!(report.total_consumption, 0.0);
        assert_eq!(report.average_daily, 0.0);
        assert_eq!(report.load_factor, 0.0);
        assert_eq!(report.active_days, 0);
        assert_eq!(report.anomalies_count, 0);
        assert_eq!(report.monthly_trend_pct, None);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].level, AlertLevel::Low);
        assert!(report.opportunities.is_empty());
    }

    #[test]
    fn evening_spike_scenario() {
        let report = AnalyticsEngine::default().analyze(&evening_spike_day());

        assert_eq!(report.total_consumption, 28.0);
        assert_eq!(report.max_consumption, 5.0);
        assert_eq!(report.peak_hour, 20);
        assert_eq!(report.peak_hour_average, 5.0);
        assert_eq!(report.load_factor, 0.233);
        assert_eq!(report.average_hourly, 1.167);
        assert_eq!(report.average_daily, 28.0);
        assert_eq!(report.active_days, 1);
        assert_eq!(report.base_load, 1.0);
        assert_eq!(report.anomalies_count, 0);

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].level, AlertLevel::High);
        assert_eq!(report.alerts[0].title, "Highly irregular load curve");
        assert!(report.has_high_alert());
        assert!(report.recommendation.starts_with("Prioritise reducing peaks"));

        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].estimated_savings_pct, 6);
    }

    #[test]
    fn time_bands_cover_the_whole_day() {
        let report = AnalyticsEngine::default().analyze(&evening_spike_day());
        // 8 kWh at night, 10 kWh daytime, 10 kWh evening out of 28.
        assert_eq!(report.night_share, 28.6);
        assert_eq!(report.daytime_share, 35.7);
        assert_eq!(report.evening_share, 35.7);
        let sum = report.night_share + report.daytime_share + report.evening_share;
        assert!((sum - 100.0).abs() <= 0.15);
        assert_eq!(report.weekend_share, 0.0);
    }

    #[test]
    fn weekend_reading_also_counts_in_its_time_band() {
        // 2024-06-01 is a Saturday.
        let report = AnalyticsEngine::default().analyze(&[reading("2024-06-01", "02:00", 3.0)]);
        assert_eq!(report.weekend_share, 100.0);
        assert_eq!(report.night_share, 100.0);
    }

    #[test]
    fn peak_hour_is_lowest_hour_reaching_the_highest_average() {
        let readings = vec![
            reading("2024-03-05", "09:00", 2.0),
            reading("2024-03-06", "09:00", 4.0),
            reading("2024-03-05", "14:00", 3.0),
            reading("2024-03-05", "21:00", 3.0),
        ];
        let report = AnalyticsEngine::default().analyze(&readings);
        // Hour 9 averages 3.0 from two readings and ties with 14 and 21.
        assert_eq!(report.peak_hour, 9);
        assert_eq!(report.peak_hour_average, 3.0);
    }

    #[test]
    fn monthly_growth_raises_trend_alert_and_opportunity() {
        let readings = vec![reading("2024-01-10", "12:00", 100.0), reading("2024-02-10", "12:00", 120.0)];
        let report = AnalyticsEngine::default().analyze(&readings);

        assert_eq!(report.monthly_trend_pct, Some(20.0));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].title, "Rising monthly trend");
        assert!(report.alerts[0].detail.contains("20.0%"));
        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].title, "Correct the growth trend");
    }

    #[test]
    fn trend_compares_the_two_latest_months_regardless_of_input_order() {
        let readings = vec![
            reading("2024-03-02", "12:00", 90.0),
            reading("2023-12-02", "12:00", 500.0),
            reading("2024-02-02", "12:00", 100.0),
        ];
        let report = AnalyticsEngine::default().analyze(&readings);
        assert_eq!(report.monthly_trend_pct, Some(-10.0));
    }

    #[test]
    fn trend_is_absent_when_previous_month_is_empty() {
        let readings = vec![reading("2024-01-10", "12:00", 0.0), reading("2024-02-10", "12:00", 5.0)];
        let report = AnalyticsEngine::default().analyze(&readings);
        assert_eq!(report.monthly_trend_pct, None);
    }

    #[test]
    fn outlier_day_is_counted_as_anomaly() {
        let mut readings: Vec<Reading> = (1..=9)
            .map(|d| reading(&format!("2024-01-{d:02}"), "12:00", 10.0))
            .collect();
        readings.push(reading("2024-01-10", "12:00", 40.0));

        let report = AnalyticsEngine::default().analyze(&readings);
        // mean 13, sd 9, threshold 29.2
        assert_eq!(report.anomalies_count, 1);
        assert!(report.alerts.iter().any(|a| a.title == "Anomalous days detected"));
    }

    #[test]
    fn flat_profile_gets_fallback_alert_and_opportunity() {
        let readings: Vec<Reading> = (8..18)
            .map(|h| reading("2024-03-05", &format!("{h:02}:00"), 1.0))
            .collect();
        let report = AnalyticsEngine::default().analyze(&readings);

        assert_eq!(report.load_factor, 1.0);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].level, AlertLevel::Low);
        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].priority, Priority::Low);
        assert!(report.recommendation.starts_with("The profile is stable"));
    }

    #[test]
    fn evening_peak_without_alerts_suggests_shifting_load() {
        let readings: Vec<Reading> = (0..24)
            .map(|h| {
                let kwh = match h {
                    0..=7 => 0.5,
                    19 => 1.4,
                    _ => 1.0,
                };
                reading("2024-03-05", &format!("{h:02}:00"), kwh)
            })
            .collect();
        let report = AnalyticsEngine::default().analyze(&readings);

        assert_eq!(report.peak_hour, 19);
        assert!(!report.has_high_alert());
        assert!(report.recommendation.starts_with("The peak falls in the evening band"));
    }

    #[test]
    fn heavy_night_use_without_high_alert_recommends_night_review() {
        // 2 kWh per night hour, 1 kWh otherwise: night share 16 / 32 = 50%.
        let readings: Vec<Reading> = (0..24)
            .map(|h| reading("2024-03-05", &format!("{h:02}:00"), if h <= 7 { 2.0 } else { 1.0 }))
            .collect();
        let report = AnalyticsEngine::default().analyze(&readings);

        assert_eq!(report.night_share, 50.0);
        assert!(!report.has_high_alert());
        assert_eq!(report.alerts[0].title, "High night-time consumption");
        assert_eq!(report.opportunities[0].estimated_savings_pct, 8);
        assert!(report.recommendation.starts_with("There is clear room for savings at night"));
    }

    #[rstest]
    #[case(0.30, true)]
    #[case(0.20, false)]
    fn irregular_curve_threshold_is_configurable(#[case] limit: f64, #[case] fires: bool) {
        let engine = AnalyticsEngine::new(AnalysisThresholds {
            irregular_load_factor: limit,
            ..AnalysisThresholds::default()
        });
        let report = engine.analyze(&evening_spike_day());
        assert_eq!(report.alerts.iter().any(|a| a.title == "Highly irregular load curve"), fires);
    }

    #[test]
    fn input_order_does_not_change_the_report() {
        let mut readings = evening_spike_day();
        readings.push(reading("2024-04-01", "08:00", 2.5));
        let forward = AnalyticsEngine::default().analyze(&readings);
        readings.reverse();
        let backward = AnalyticsEngine::default().analyze(&readings);
        assert_eq!(forward, backward);
    }

    #[test]
    fn negative_readings_carry_no_energy() {
        let report = AnalyticsEngine::default().analyze(&[
            reading("2024-03-05", "10:00", -4.0),
            reading("2024-03-05", "11:00", 2.0),
        ]);
        assert_eq!(report.total_consumption, 2.0);
        assert!((report.average_hourly - 1.0).abs() < EPS);
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = AnalyticsEngine::default().analyze(&evening_spike_day());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["peakHour"], 20);
        assert_eq!(json["monthlyTrendPct"], serde_json::Value::Null);
        assert_eq!(json["alerts"][0]["level"], "high");
        assert_eq!(json["opportunities"][0]["estimatedSavingsPct"], 6);
    }
}
