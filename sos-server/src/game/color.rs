//! Per-player color assignment. The original hands each player an HSL
//! string computed from their join order; reproduced here as an even split
//! of the hue wheel so colors stay visually distinct regardless of how many
//! players a game holds.

pub fn assign(seat_index: usize, player_count: usize) -> String {
    let slots = player_count.max(1);
    let hue = (seat_index * 360 / slots) % 360;
    format!("hsl({hue}, 70%, 50%)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spreads_players_evenly_around_the_hue_wheel() {
        assert_eq!(assign(0, 2), "hsl(0, 70%, 50%)");
        assert_eq!(assign(1, 2), "hsl(180, 70%, 50%)");
    }
}
