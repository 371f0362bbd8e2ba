//! Сохраняемые настройки плеера: скорость и громкость

use std::sync::Arc;

use crate::config::{PlayerConfig, AUDIO_VOLUME_KEY, PLAYBACK_SPEED_KEY};
use crate::error::Result;
use crate::store::{read_json, write_json, KeyValueStore};

/// Настройки воспроизведения в хранилище
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    default_speed: f32,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &PlayerConfig) -> Self {
        Self {
            store,
            default_speed: config.default_speed,
        }
    }

    /// Сохранённая скорость или скорость по умолчанию
    pub fn playback_speed(&self) -> Result<f32> {
        let speed: Option<f32> = read_json(self.store.as_ref(), PLAYBACK_SPEED_KEY)?;
        Ok(match speed {
            Some(speed) if speed.is_finite() && speed > 0.0 => speed,
            Some(speed) => {
                log::warn!("Ignoring stored playback speed {}", speed);
                self.default_speed
            }
            None => self.default_speed,
        })
    }

    pub fn set_playback_speed(&self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(format!("Invalid playback speed: {}", speed).into());
        }
        write_json(self.store.as_ref(), PLAYBACK_SPEED_KEY, &speed)
    }

    /// Сохранённая громкость, если есть
    pub fn volume(&self) -> Result<Option<f32>> {
        let volume: Option<f32> = read_json(self.store.as_ref(), AUDIO_VOLUME_KEY)?;
        Ok(volume.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0)))
    }

    /// Сохранить громкость (ограничивается диапазоном 0..=1)
    pub fn set_volume(&self, volume: f32) -> Result<f32> {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        write_json(self.store.as_ref(), AUDIO_VOLUME_KEY, &volume)?;
        Ok(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn preferences() -> (Preferences, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Preferences::new(store.clone(), &PlayerConfig::default()), store)
    }

    #[test]
    fn test_speed_defaults_and_persists() {
        let (prefs, store) = preferences();
        assert_eq!(prefs.playback_speed().unwrap(), 1.0);

        prefs.set_playback_speed(1.25).unwrap();
        assert_eq!(prefs.playback_speed().unwrap(), 1.25);
        assert_eq!(store.get(PLAYBACK_SPEED_KEY).unwrap(), Some("1.25".to_string()));

        assert!(prefs.set_playback_speed(0.0).is_err());
        assert_eq!(prefs.playback_speed().unwrap(), 1.25);
    }

    #[test]
    fn test_corrupt_speed_falls_back() {
        let (prefs, store) = preferences();
        store.set(PLAYBACK_SPEED_KEY, "fast").unwrap();
        assert_eq!(prefs.playback_speed().unwrap(), 1.0);
        store.set(PLAYBACK_SPEED_KEY, "-2").unwrap();
        assert_eq!(prefs.playback_speed().unwrap(), 1.0);
    }

    #[test]
    fn test_volume_is_clamped() {
        let (prefs, store) = preferences();
        assert_eq!(prefs.volume().unwrap(), None);

        assert_eq!(prefs.set_volume(1.7).unwrap(), 1.0);
        assert_eq!(prefs.set_volume(0.35).unwrap(), 0.35);
        assert_eq!(prefs.volume().unwrap(), Some(0.35));

        store.set(AUDIO_VOLUME_KEY, "-0.5").unwrap();
        assert_eq!(prefs.volume().unwrap(), Some(0.0));
    }
}
